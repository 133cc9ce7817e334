//! Crate-wide error type.
//!
//! One flat enum covers every kind named in the specification: parse and
//! resolve failures never reach a backend, execution/timeout/cancellation
//! errors are subject to an extension's error policy, and the remainder map
//! 1:1 onto HTTP status codes in `server::http`.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("resolve error: {0}")]
    Resolve(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("execution error ({backend}): {message}")]
    Execution { backend: String, message: String },

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("authentication failed")]
    Auth,

    #[error("access denied by ACL")]
    Acl,

    #[error("query cache is full")]
    CacheFull,

    #[error("resource leak: {0}")]
    ResourceLeak(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Kind tag used for metrics/logging without exposing the message.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) => ErrorKind::Parse,
            Error::Resolve(_) => ErrorKind::Resolve,
            Error::Config(_) => ErrorKind::Config,
            Error::Execution { .. } => ErrorKind::Execution,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancellation,
            Error::Auth => ErrorKind::Auth,
            Error::Acl => ErrorKind::Acl,
            Error::CacheFull => ErrorKind::CacheFull,
            Error::ResourceLeak(_) => ErrorKind::ResourceLeak,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Io(_) | Error::Json(_) | Error::Csv(_) => ErrorKind::Execution,
        }
    }

    pub fn execution(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Execution {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Resolve,
    Config,
    Execution,
    Timeout,
    Cancellation,
    Auth,
    Acl,
    CacheFull,
    ResourceLeak,
    InvalidState,
    Unsupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Resolve => "resolve",
            ErrorKind::Config => "config",
            ErrorKind::Execution => "execution",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancellation => "cancellation",
            ErrorKind::Auth => "auth",
            ErrorKind::Acl => "acl",
            ErrorKind::CacheFull => "cache_full",
            ErrorKind::ResourceLeak => "resource_leak",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}
