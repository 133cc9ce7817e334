//! `shell` executor (spec §4.3): runs a command line in a scoped process.

use super::{ExecutorContext, Extension};
use crate::error::{Error, Result};
use crate::resolver::OptionSpec;
use crate::result::QueryResult;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultType {
    Auto,
    Str,
    Binary,
}

impl ResultType {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "string" => ResultType::Str,
            "binary" => ResultType::Binary,
            _ => ResultType::Auto,
        }
    }
}

pub struct ShellExtension;

#[async_trait]
impl Extension for ShellExtension {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn default_options(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::new("result.type", "auto | string | binary", "auto"),
            OptionSpec::new("result.string.trim", "trim trailing whitespace", "true"),
            OptionSpec::new("result.string.escape", "shell-escape the output", "false"),
            OptionSpec::new("result.string.replace", "k=v pairs applied to the output, comma separated", ""),
            OptionSpec::new("exec.timeout", "execution timeout in ms", "0"),
            OptionSpec::new("exec.error", "error handling policy", "throw"),
        ]
    }

    async fn execute(
        &self,
        ctx: &ExecutorContext,
        body: &str,
        options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(body.trim())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| Error::execution("shell", format!("failed to spawn: {e}")))?;

        let wait = child.wait_with_output();
        let output = tokio::select! {
            res = wait => res.map_err(|e| Error::execution("shell", format!("wait failed: {e}")))?,
            _ = ctx.cancel.cancelled() => {
                return Err(Error::Cancelled);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(Error::execution(
                "shell",
                format!("exit status {:?}: {stderr}", output.status.code()),
            ));
        }

        let result_type = options
            .get("result.type")
            .map(|s| ResultType::parse(s))
            .unwrap_or(ResultType::Auto);

        let binary = matches!(result_type, ResultType::Binary)
            || (matches!(result_type, ResultType::Auto) && std::str::from_utf8(&output.stdout).is_err());

        if binary {
            return Ok(QueryResult::scalar(Value::Binary(output.stdout)));
        }

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        if options.get("result.string.trim").map(|s| s != "false").unwrap_or(true) {
            text = text.trim_end().to_string();
        }
        if let Some(pairs) = options.get("result.string.replace") {
            for pair in pairs.split(',').filter(|s| !s.is_empty()) {
                if let Some((from, to)) = pair.split_once('=') {
                    text = text.replace(from, to);
                }
            }
        }
        if options.get("result.string.escape").map(|s| s == "true").unwrap_or(false) {
            text = shell_escape(&text);
        }
        Ok(QueryResult::scalar_str(text))
    }
}

fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{GlobalScope, Scopes};

    fn ctx() -> ExecutorContext {
        ExecutorContext::new(Scopes::new(GlobalScope::new()))
    }

    #[tokio::test]
    async fn echo_returns_trimmed_stdout() {
        let ext = ShellExtension;
        let mut r = ext
            .execute(&ctx(), "echo hello", &HashMap::new())
            .await
            .unwrap();
        let (_, rows) = r.as_fields_and_rows().unwrap();
        assert_eq!(rows[0][0], Value::Str("hello".into()));
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_execution_error() {
        let ext = ShellExtension;
        let err = ext.execute(&ctx(), "exit 1", &HashMap::new()).await;
        assert!(err.is_err());
    }

    #[test]
    fn escape_wraps_and_doubles_single_quotes() {
        assert_eq!(shell_escape("a'b"), "'a'\\''b'");
    }
}
