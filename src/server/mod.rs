//! Bridge HTTP server (spec §4.5/§4.6): `http` wires the axum `Router`
//! and request handlers; `negotiate`, `auth`, `metrics` are the request-
//! scoped pieces each handler calls into.

pub mod auth;
pub mod http;
pub mod metrics;
pub mod negotiate;

pub use http::{router, AppState, QueryMode};
