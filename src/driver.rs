//! Thin driver-facade URL parsing (spec §1: "the driver facade that
//! mimics a SQL-client API -- treated as a thin front-end issuing
//! `(query, properties)` pairs"; driver internals beyond this are out of
//! scope). Turns a `jdbcx:[<extension>[.<id>]:]<underlying-url>` string
//! into the pieces the CLI needs to pick an extension and hand off to it.

use crate::error::{Error, Result};

/// A parsed `jdbcx:` connection URL (spec §6 CLI surface).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverUrl {
    pub extension: Option<String>,
    pub extension_id: Option<String>,
    pub underlying: String,
}

const SCHEME_PREFIX: &str = "jdbcx:";

impl DriverUrl {
    /// `jdbcx:<underlying>` or `jdbcx:<extension>[.<id>]:<underlying>`.
    /// The first colon-delimited segment after the `jdbcx:` prefix is an
    /// extension name only if the remainder still contains a colon
    /// (otherwise the whole tail is the underlying URL with no extension).
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(SCHEME_PREFIX)
            .ok_or_else(|| Error::Parse(format!("expected '{SCHEME_PREFIX}' prefix, got '{url}'")))?;

        if let Some((head, tail)) = rest.split_once(':') {
            if looks_like_extension_segment(head) {
                let (name, id) = match head.split_once('.') {
                    Some((n, i)) => (n.to_string(), Some(i.to_string())),
                    None => (head.to_string(), None),
                };
                return Ok(DriverUrl {
                    extension: Some(name),
                    extension_id: id,
                    underlying: tail.to_string(),
                });
            }
        }

        Ok(DriverUrl {
            extension: None,
            extension_id: None,
            underlying: rest.to_string(),
        })
    }
}

/// An extension segment is a bare identifier (`letters, digits, '_', '.'`,
/// spec §4.1's `extension` grammar); anything containing `/` is an
/// underlying URL's scheme/host instead (e.g. `jdbc:postgresql://...`).
fn looks_like_extension_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.contains('/')
        && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_underlying_url_has_no_extension() {
        let parsed = DriverUrl::parse("jdbcx:jdbc:postgresql://localhost/db").unwrap();
        assert_eq!(parsed.extension, None);
        assert_eq!(parsed.underlying, "jdbc:postgresql://localhost/db");
    }

    #[test]
    fn extension_with_id_is_split_on_dot() {
        let parsed = DriverUrl::parse("jdbcx:web.primary:jdbc:postgresql://localhost/db").unwrap();
        assert_eq!(parsed.extension.as_deref(), Some("web"));
        assert_eq!(parsed.extension_id.as_deref(), Some("primary"));
        assert_eq!(parsed.underlying, "jdbc:postgresql://localhost/db");
    }

    #[test]
    fn extension_without_id() {
        let parsed = DriverUrl::parse("jdbcx:shell:jdbc:h2:mem:").unwrap();
        assert_eq!(parsed.extension.as_deref(), Some("shell"));
        assert_eq!(parsed.extension_id, None);
        assert_eq!(parsed.underlying, "jdbc:h2:mem:");
    }

    #[test]
    fn missing_scheme_prefix_is_a_parse_error() {
        assert!(DriverUrl::parse("jdbc:postgresql://localhost/db").is_err());
    }
}
