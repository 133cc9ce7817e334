//! Small built-in executors: `default`, `blackhole`, `var`, `help`,
//! `prompt`, `codeql` (SPEC_FULL §4.3, "supplemented executors").

use super::{ExecutorContext, Extension, Registry};
use crate::error::{Error, Result};
use crate::resolver::{OptionSpec, ScopeName};
use crate::result::QueryResult;
use crate::value::{Field, JdbcType, Value};
use async_trait::async_trait;
use std::collections::HashMap;

/// The extension run for an empty header (spec §4.1: "the entire inside
/// is treated as the body and the extension is empty, meaning: default
/// extension"). Passes the body through verbatim after variable expansion,
/// which already happened in the resolver before the executor ever sees it.
pub struct DefaultExtension;

#[async_trait]
impl Extension for DefaultExtension {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn execute(
        &self,
        _ctx: &ExecutorContext,
        body: &str,
        _options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        Ok(QueryResult::scalar_str(body))
    }
}

/// Discards the body unconditionally; used to benchmark parse/resolve
/// overhead without executor cost.
pub struct BlackholeExtension;

#[async_trait]
impl Extension for BlackholeExtension {
    fn name(&self) -> &'static str {
        "blackhole"
    }

    async fn execute(
        &self,
        _ctx: &ExecutorContext,
        _body: &str,
        _options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        Ok(QueryResult::scalar_str(""))
    }
}

/// Reads or writes a variable in a named scope without running external
/// code. Body is `scope.name` (get) or `scope.name=value` (set).
pub struct VarExtension;

#[async_trait]
impl Extension for VarExtension {
    fn name(&self) -> &'static str {
        "var"
    }

    fn default_options(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::new("scope", "query|thread|global, overrides a scope prefix in the body", "")]
    }

    async fn execute(
        &self,
        ctx: &ExecutorContext,
        body: &str,
        options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        let (scope, rest) = split_scope_prefix(body, options);
        if let Some((name, value)) = rest.split_once('=') {
            let mut query_guard = ctx.query.lock();
            ctx.scopes.write(scope, name.trim(), value.trim(), Some(&mut query_guard))?;
            Ok(QueryResult::scalar_str(value.trim()))
        } else {
            let query_guard = ctx.query.lock();
            let value = ctx.scopes.lookup(rest.trim(), Some(&query_guard)).unwrap_or_default();
            Ok(QueryResult::scalar_str(value))
        }
    }
}

fn split_scope_prefix<'a>(body: &'a str, options: &HashMap<String, String>) -> (ScopeName, &'a str) {
    if let Some(explicit) = options.get("scope") {
        return (parse_scope(explicit), body);
    }
    for (prefix, scope) in [("query.", ScopeName::Query), ("thread.", ScopeName::Thread), ("global.", ScopeName::Global)] {
        if let Some(rest) = body.strip_prefix(prefix) {
            return (scope, rest);
        }
    }
    (ScopeName::Global, body)
}

fn parse_scope(s: &str) -> ScopeName {
    match s.to_ascii_lowercase().as_str() {
        "query" => ScopeName::Query,
        "thread" => ScopeName::Thread,
        _ => ScopeName::Global,
    }
}

/// Self-describing catalog of registered extensions and their options,
/// grounded on the teacher's synthetic catalog-query introspection
/// pattern but served over the extension registry instead of `pg_catalog`.
pub struct HelpExtension;

impl HelpExtension {
    pub fn new() -> Self {
        HelpExtension
    }

    fn snapshot() -> Vec<(&'static str, Vec<OptionSpec>)> {
        Registry::with_builtins().all_option_specs()
    }
}

#[async_trait]
impl Extension for HelpExtension {
    fn name(&self) -> &'static str {
        "help"
    }

    async fn execute(
        &self,
        _ctx: &ExecutorContext,
        _body: &str,
        _options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        let fields = vec![
            Field::new("extension", JdbcType::Varchar),
            Field::new("option", JdbcType::Varchar),
            Field::new("default_value", JdbcType::Varchar),
            Field::new("description", JdbcType::Varchar),
        ];
        let mut rows = Vec::new();
        for (name, specs) in Self::snapshot() {
            if specs.is_empty() {
                rows.push(vec![
                    Value::Str(name.to_string()),
                    Value::Null,
                    Value::Null,
                    Value::Str("(no options)".to_string()),
                ]);
                continue;
            }
            for spec in specs {
                rows.push(vec![
                    Value::Str(name.to_string()),
                    Value::Str(spec.name.clone()),
                    Value::Str(spec.default_value.clone()),
                    Value::Str(spec.description.clone()),
                ]);
            }
        }
        Ok(QueryResult::rows_vec(fields, rows))
    }
}

/// Renders the body after variable expansion and returns it verbatim. A
/// placeholder extension point for a future LLM-backed executor this core
/// does not implement (SPEC_FULL §4.3) — registered so whitelist/blacklist
/// validation and `help` output are complete.
pub struct PromptExtension;

#[async_trait]
impl Extension for PromptExtension {
    fn name(&self) -> &'static str {
        "prompt"
    }

    async fn execute(
        &self,
        _ctx: &ExecutorContext,
        body: &str,
        _options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        tracing::debug!("prompt extension invoked; no LLM backend wired in");
        Ok(QueryResult::scalar_str(body))
    }
}

/// Reserved name for a static-analysis integration out of scope for this
/// core (SPEC_FULL §4.3); always errors.
pub struct CodeqlExtension;

#[async_trait]
impl Extension for CodeqlExtension {
    fn name(&self) -> &'static str {
        "codeql"
    }

    async fn execute(
        &self,
        _ctx: &ExecutorContext,
        _body: &str,
        _options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        Err(Error::Unsupported("codeql extension is not implemented by this core".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{GlobalScope, Scopes};

    fn ctx() -> ExecutorContext {
        ExecutorContext::new(Scopes::new(GlobalScope::new()))
    }

    #[tokio::test]
    async fn default_extension_passes_body_through() {
        let ext = DefaultExtension;
        let mut r = ext.execute(&ctx(), "select 1", &HashMap::new()).await.unwrap();
        let (_, rows) = r.as_fields_and_rows().unwrap();
        assert_eq!(rows[0][0], Value::Str("select 1".into()));
    }

    #[tokio::test]
    async fn var_set_then_get_round_trips_through_global_scope() {
        let ext = VarExtension;
        let context = ctx();
        ext.execute(&context, "global.name=value1", &HashMap::new()).await.unwrap();
        let mut r = ext.execute(&context, "global.name", &HashMap::new()).await.unwrap();
        let (_, rows) = r.as_fields_and_rows().unwrap();
        assert_eq!(rows[0][0], Value::Str("value1".into()));
    }

    #[tokio::test]
    async fn help_lists_every_registered_extension() {
        let ext = HelpExtension::new();
        let mut r = ext.execute(&ctx(), "", &HashMap::new()).await.unwrap();
        let (_, rows) = r.as_fields_and_rows().unwrap();
        let extensions: std::collections::HashSet<_> = rows
            .iter()
            .map(|row| match &row[0] {
                Value::Str(s) => s.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert!(extensions.contains("db"));
        assert!(extensions.contains("web"));
    }

    #[tokio::test]
    async fn codeql_is_unimplemented() {
        let ext = CodeqlExtension;
        assert!(ext.execute(&ctx(), "", &HashMap::new()).await.is_err());
    }
}
