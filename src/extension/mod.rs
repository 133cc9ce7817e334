//! C3: Extension Registry & Executor (spec §4.3).

pub mod bridge;
pub mod db;
pub mod misc;
pub mod mcp;
pub mod query;
pub mod script;
pub mod shell;
pub mod web;

use crate::error::{Error, Result};
use crate::resolver::{OptionSpec, QueryScope, Scopes};
use crate::result::QueryResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// `exec.error` policy (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Ignore,
    Warn,
    Throw,
    Return,
}

impl ErrorPolicy {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => ErrorPolicy::Ignore,
            "warn" => ErrorPolicy::Warn,
            "return" => ErrorPolicy::Return,
            _ => ErrorPolicy::Throw,
        }
    }
}

/// Context shared by every executor invocation: scopes, the optional
/// parent connection (abstracted `Connection` contract — concrete backend
/// clients are out of scope per spec §1), a cancellation signal, and the
/// warnings sink for `exec.error = warn`.
#[derive(Clone)]
pub struct ExecutorContext {
    pub scopes: Scopes,
    pub query: Arc<Mutex<QueryScope>>,
    pub warnings: Arc<Mutex<Vec<String>>>,
    pub cancel: CancellationToken,
    pub connection: Option<Arc<dyn db::Connection>>,
}

impl ExecutorContext {
    pub fn new(scopes: Scopes) -> Self {
        ExecutorContext {
            scopes,
            query: Arc::new(Mutex::new(QueryScope::new())),
            warnings: Arc::new(Mutex::new(Vec::new())),
            cancel: CancellationToken::new(),
            connection: None,
        }
    }

    pub fn with_connection(mut self, connection: Arc<dyn db::Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.warnings.lock().push(message.into());
    }
}

/// A named executor registered with the core (spec §4.3 contract).
#[async_trait]
pub trait Extension: Send + Sync {
    fn name(&self) -> &'static str;

    fn default_options(&self) -> Vec<OptionSpec> {
        Vec::new()
    }

    async fn execute(
        &self,
        ctx: &ExecutorContext,
        body: &str,
        options: &HashMap<String, String>,
    ) -> Result<QueryResult>;
}

/// Name -> Extension map, populated once at startup and read-only
/// thereafter (spec §9: replaces service-loader plugin discovery).
#[derive(Clone)]
pub struct Registry {
    extensions: Arc<HashMap<String, Arc<dyn Extension>>>,
    whitelist: Option<Arc<Vec<String>>>,
}

impl Registry {
    pub fn with_builtins() -> Self {
        let mut map: HashMap<String, Arc<dyn Extension>> = HashMap::new();
        let builtins: Vec<Arc<dyn Extension>> = vec![
            Arc::new(misc::DefaultExtension),
            Arc::new(db::DbExtension),
            Arc::new(db::PrqlExtension),
            Arc::new(script::ScriptExtension),
            Arc::new(shell::ShellExtension),
            Arc::new(web::WebExtension),
            Arc::new(query::QueryExtension),
            Arc::new(mcp::McpExtension),
            Arc::new(bridge::BridgeExtension),
            Arc::new(misc::BlackholeExtension),
            Arc::new(misc::HelpExtension::new()),
            Arc::new(misc::VarExtension),
            Arc::new(misc::PromptExtension),
            Arc::new(misc::CodeqlExtension),
        ];
        for ext in builtins {
            map.insert(ext.name().to_string(), ext);
        }
        Registry { extensions: Arc::new(map), whitelist: None }
    }

    pub fn with_whitelist(mut self, names: Vec<String>) -> Self {
        self.whitelist = Some(Arc::new(names));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Extension>> {
        if let Some(wl) = &self.whitelist {
            if !wl.iter().any(|n| n == name) {
                return None;
            }
        }
        // Empty extension name means "default extension" (spec §4.1).
        let key = if name.is_empty() { "default" } else { name };
        self.extensions.get(key).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extensions.values().map(|e| e.name()).collect()
    }

    pub fn all_option_specs(&self) -> Vec<(&'static str, Vec<OptionSpec>)> {
        self.extensions
            .values()
            .map(|e| (e.name(), e.default_options()))
            .collect()
    }

    /// Run `name`'s executor honoring `exec.timeout` and `exec.error`
    /// (spec §4.3): timeouts cancel the underlying work and route the
    /// resulting `TimeoutError` through the same error policy as any other
    /// execution error.
    pub async fn execute(
        &self,
        name: &str,
        ctx: &ExecutorContext,
        body: &str,
        options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        let extension = self
            .get(name)
            .ok_or_else(|| Error::Unsupported(format!("unknown extension '{name}'")))?;

        let policy = options
            .get("exec.error")
            .map(|s| ErrorPolicy::parse(s))
            .unwrap_or(ErrorPolicy::Throw);
        let timeout_ms: i64 = options
            .get("exec.timeout")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let fut = extension.execute(ctx, body, options);
        let outcome = if timeout_ms > 0 {
            match tokio::time::timeout(Duration::from_millis(timeout_ms as u64), fut).await {
                Ok(r) => r,
                Err(_) => {
                    ctx.cancel.cancel();
                    Err(Error::Timeout(Duration::from_millis(timeout_ms as u64)))
                }
            }
        } else {
            fut.await
        };

        match outcome {
            Ok(result) => Ok(result),
            Err(e) => apply_error_policy(policy, name, body, e, ctx),
        }
    }
}

fn apply_error_policy(
    policy: ErrorPolicy,
    name: &str,
    body: &str,
    err: Error,
    ctx: &ExecutorContext,
) -> Result<QueryResult> {
    match policy {
        ErrorPolicy::Ignore => {
            tracing::debug!(extension = name, error = %err, "ignored executor error");
            Ok(QueryResult::scalar_str(""))
        }
        ErrorPolicy::Warn => {
            ctx.warn(format!("{name}: {err}"));
            Ok(QueryResult::scalar_str(body))
        }
        ErrorPolicy::Return => Ok(QueryResult::scalar_str(err.to_string())),
        ErrorPolicy::Throw => Err(err),
    }
}
