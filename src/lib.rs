//! JDBCX: query-composition core and HTTP bridge server.
//!
//! A query is source text with embedded `{{ extension: body }}` blocks
//! (`parser`). Each block's options are resolved against three variable
//! scopes (`resolver`) and dispatched to a named backend (`extension`),
//! whose uniform `Result` (`result`) is serialized to a wire format
//! (`serialize`) and optionally compressed (`compress`). `pipeline` ties
//! parse/resolve/execute/splice together for a single invocation; the
//! bridge server (`server`) exposes the same flow over HTTP with a
//! request-scoped cache (`cache`) and access control (`acl`).

pub mod acl;
pub mod cache;
pub mod compress;
pub mod config;
pub mod driver;
pub mod error;
pub mod extension;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod result;
pub mod serialize;
pub mod value;

#[cfg(feature = "server")]
pub mod server;
