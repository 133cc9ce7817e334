//! `query` executor (spec §4.3 / §8 scenario S2): reads one or more query
//! files and reports per-statement-group execution accounting.

use super::db::split_statements;
use super::{ExecutorContext, Extension};
use crate::error::{Error, Result};
use crate::resolver::OptionSpec;
use crate::result::QueryResult;
use crate::value::{Field, JdbcType, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;

pub struct QueryExtension;

#[async_trait]
impl Extension for QueryExtension {
    fn name(&self) -> &'static str {
        "query"
    }

    fn default_options(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::new("path", "glob of query files to read", ""),
            OptionSpec::new("input.file", "a single query file path", ""),
            OptionSpec::new("exec.timeout", "execution timeout in ms", "30000"),
            OptionSpec::new("exec.error", "error handling policy", "throw"),
        ]
    }

    async fn execute(
        &self,
        ctx: &ExecutorContext,
        body: &str,
        options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        let mut sources = Vec::new();
        if let Some(path) = options.get("input.file").filter(|s| !s.is_empty()) {
            sources.push(path.clone());
        }
        if let Some(glob_pattern) = options.get("path").filter(|s| !s.is_empty()) {
            sources.extend(glob_matches(glob_pattern)?);
        }

        let connection = ctx.connection.clone();
        let thread = format!("{:?}", std::thread::current().id());
        let connection_hash = connection
            .as_ref()
            .map(|c| format!("{:x}", std::sync::Arc::as_ptr(c) as *const () as usize))
            .unwrap_or_else(|| "none".to_string());

        let mut rows = Vec::new();
        if sources.is_empty() {
            // No files configured: treat the block body itself as the
            // single source, matching scenario S2 where `query` is fed
            // the body directly rather than a file path.
            run_source(
                "<inline>",
                body,
                connection.as_deref(),
                &thread,
                &connection_hash,
                &mut rows,
            )
            .await?;
        } else {
            for source in &sources {
                let text = std::fs::read_to_string(source)
                    .map_err(|e| Error::execution("query", format!("failed to read '{source}': {e}")))?;
                run_source(source, &text, connection.as_deref(), &thread, &connection_hash, &mut rows).await?;
            }
        }

        let fields = vec![
            Field::new("thread", JdbcType::Varchar),
            Field::new("connection_hash", JdbcType::Varchar),
            Field::new("source_path", JdbcType::Varchar),
            Field::new("group", JdbcType::Integer),
            Field::new("label", JdbcType::Varchar),
            Field::new("query_count", JdbcType::Integer),
            Field::new("update_count", JdbcType::Integer),
            Field::new("total_operations", JdbcType::Integer),
            Field::new("affected_rows", JdbcType::BigInt),
            Field::new("elapsed_ms", JdbcType::BigInt),
        ];
        Ok(QueryResult::rows_vec(fields, rows))
    }
}

async fn run_source(
    source_path: &str,
    text: &str,
    connection: Option<&dyn super::db::Connection>,
    thread: &str,
    connection_hash: &str,
    rows: &mut Vec<Vec<Value>>,
) -> Result<()> {
    let groups = split_statements(text);
    for group in &groups {
        let started = Instant::now();
        let mut query_count = 0i64;
        let mut update_count = 0i64;
        let mut affected_rows = 0i64;
        for statement in &group.statements {
            let lower = statement.trim().to_ascii_lowercase();
            if let Some(conn) = connection {
                let mut result = conn.execute_one(statement).await?;
                match &result.body {
                    crate::result::ResultBody::Update { affected } => {
                        update_count += 1;
                        affected_rows += affected;
                    }
                    _ => query_count += 1,
                }
                result.close()?;
            } else if lower.starts_with("select") {
                query_count += 1;
            } else {
                update_count += 1;
            }
        }
        rows.push(vec![
            Value::Str(thread.to_string()),
            Value::Str(connection_hash.to_string()),
            Value::Str(source_path.to_string()),
            Value::Integral { width: 32, signed: true, value: group.group as i64 + 1 },
            Value::Str(group.label.clone()),
            Value::Integral { width: 32, signed: true, value: query_count },
            Value::Integral { width: 32, signed: true, value: update_count },
            Value::Integral {
                width: 32,
                signed: true,
                value: query_count + update_count,
            },
            Value::Integral { width: 64, signed: true, value: affected_rows },
            Value::Integral {
                width: 64,
                signed: true,
                value: started.elapsed().as_millis() as i64,
            },
        ]);
    }
    Ok(())
}

/// Minimal glob: supports a literal path or a single trailing `*`
/// component, matching the subset of glob the source's query-file loader
/// actually needs (no recursive `**`).
fn glob_matches(pattern: &str) -> Result<Vec<String>> {
    if !pattern.contains('*') {
        return Ok(vec![pattern.to_string()]);
    }
    let path = std::path::Path::new(pattern);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let file_pattern = path.file_name().and_then(|f| f.to_str()).unwrap_or("*");
    let (prefix, suffix) = file_pattern.split_once('*').unwrap_or((file_pattern, ""));

    let mut matches = Vec::new();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::execution("query", format!("failed to list '{}': {e}", dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::execution("query", format!("failed to read dir entry: {e}")))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(suffix) {
            matches.push(entry.path().to_string_lossy().to_string());
        }
    }
    matches.sort();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{GlobalScope, Scopes};

    fn ctx() -> ExecutorContext {
        ExecutorContext::new(Scopes::new(GlobalScope::new()))
    }

    #[tokio::test]
    async fn s2_scenario_yields_three_grouped_rows() {
        let body = "--;; 1st query\nselect 1\n--;; 2nd query\nselect 2\n--;; 1st update\ncreate table a(b) ; insert into a values('x'),('y')\n";
        let ext = QueryExtension;
        let mut r = ext.execute(&ctx(), body, &HashMap::new()).await.unwrap();
        let (_, rows) = r.as_fields_and_rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][4], Value::Str("1st query".into()));
        assert_eq!(rows[2][4], Value::Str("1st update".into()));
        assert_eq!(rows[0][5], Value::Integral { width: 32, signed: true, value: 1 });
        assert_eq!(rows[2][6], Value::Integral { width: 32, signed: true, value: 1 });
    }

    #[tokio::test]
    async fn missing_input_file_is_an_execution_error() {
        let ext = QueryExtension;
        let mut opts = HashMap::new();
        opts.insert("input.file".to_string(), "/no/such/file.sql".to_string());
        let err = ext.execute(&ctx(), "", &opts).await;
        assert!(err.is_err());
    }
}
