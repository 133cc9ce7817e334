//! Bearer-token auth (spec §4.5 step 1: "If `auth` enabled: bearer token
//! in `Authorization: Bearer ...` must match a registered token; else
//! 401. If absent: allowed.").

use crate::error::{Error, Result};

/// `expected` is `None` when auth is disabled (no token configured), in
/// which case every request is allowed regardless of headers.
pub fn check_bearer(expected: Option<&str>, authorization_header: Option<&str>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match authorization_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(provided) if provided == expected => Ok(()),
        _ => Err(Error::Auth),
    }
}
