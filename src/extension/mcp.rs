//! `mcp` executor (spec §4.3): starts or reuses a Model Context Protocol
//! client session and routes a request to it. MCP itself is treated as an
//! opaque transport (spec GLOSSARY); this module only shapes the request
//! the way the executor contract requires and delegates the actual
//! request/response exchange to a [`McpTransport`].

use super::{ExecutorContext, Extension};
use crate::error::{Error, Result};
use crate::resolver::OptionSpec;
use crate::result::QueryResult;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// What the request routes to (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Info,
    Capability,
    Prompt,
    Resource,
    ResourceTemplate,
    Tool,
}

impl Target {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "info" => Ok(Target::Info),
            "capability" => Ok(Target::Capability),
            "prompt" => Ok(Target::Prompt),
            "resource" => Ok(Target::Resource),
            "resource_template" => Ok(Target::ResourceTemplate),
            "tool" => Ok(Target::Tool),
            other => Err(Error::execution("mcp", format!("unknown target '{other}'"))),
        }
    }

    fn method(&self) -> &'static str {
        match self {
            Target::Info => "initialize",
            Target::Capability => "capabilities/list",
            Target::Prompt => "prompts/get",
            Target::Resource => "resources/read",
            Target::ResourceTemplate => "resources/templates/list",
            Target::Tool => "tools/call",
        }
    }
}

pub struct McpExtension;

#[async_trait]
impl Extension for McpExtension {
    fn name(&self) -> &'static str {
        "mcp"
    }

    fn default_options(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::new("target", "info|capability|prompt|resource|resource_template|tool", "info"),
            OptionSpec::new("cmd", "command to spawn for a stdio session", ""),
            OptionSpec::new("args", "space-separated args for `cmd`", ""),
            OptionSpec::new("env", "comma-separated k=v env vars for `cmd`", ""),
            OptionSpec::new("url", "base URL for an HTTP-SSE session", ""),
            OptionSpec::new("bearer", "bearer token for an HTTP-SSE session", ""),
            OptionSpec::new("prompt", "prompt name argument", ""),
            OptionSpec::new("resource", "resource uri argument", ""),
            OptionSpec::new("tool", "tool name argument", ""),
            OptionSpec::new("exec.timeout", "execution timeout in ms", "30000"),
            OptionSpec::new("exec.error", "error handling policy", "throw"),
        ]
    }

    async fn execute(
        &self,
        _ctx: &ExecutorContext,
        body: &str,
        options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        let target = Target::parse(options.get("target").map(|s| s.as_str()).unwrap_or("info"))?;
        let arg_name = match target {
            Target::Prompt => options.get("prompt").cloned(),
            Target::Resource | Target::ResourceTemplate => options.get("resource").cloned(),
            Target::Tool => options.get("tool").cloned(),
            _ => None,
        };
        let arguments = parse_body_arguments(body);

        let session: Box<dyn McpTransport> = if let Some(cmd) = options.get("cmd").filter(|s| !s.is_empty()) {
            Box::new(StdioSession::spawn(cmd, options.get("args").map(|s| s.as_str()).unwrap_or(""), options.get("env").map(|s| s.as_str()).unwrap_or(""))?)
        } else if let Some(url) = options.get("url").filter(|s| !s.is_empty()) {
            Box::new(HttpSession::new(url.clone(), options.get("bearer").cloned()))
        } else {
            return Err(Error::execution("mcp", "mcp requires either cmd (stdio) or url (http-sse)"));
        };

        let params = json!({ "name": arg_name, "arguments": arguments });
        let response = session.request(target.method(), params).await?;
        Ok(QueryResult::scalar(crate::value::Value::Json(response)))
    }
}

fn parse_body_arguments(body: &str) -> serde_json::Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| serde_json::Value::String(trimmed.to_string()))
}

/// The opaque MCP transport the executor drives. A real build plugs in a
/// JSON-RPC-over-stdio or JSON-RPC-over-SSE client; the contract here is
/// kept minimal since the wire protocol itself is explicitly out of scope.
#[async_trait]
trait McpTransport: Send + Sync {
    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value>;
}

struct StdioSession {
    cmd: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl StdioSession {
    fn spawn(cmd: &str, args: &str, env: &str) -> Result<Self> {
        let args = args.split_whitespace().map(|s| s.to_string()).collect();
        let env = env
            .split(',')
            .filter(|s| !s.is_empty())
            .filter_map(|pair| pair.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
            .collect();
        Ok(StdioSession { cmd: cmd.to_string(), args, env })
    }
}

#[async_trait]
impl McpTransport for StdioSession {
    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let mut command = Command::new(&self.cmd);
        command
            .args(&self.args)
            .envs(self.env.iter().cloned())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = command
            .spawn()
            .map_err(|e| Error::execution("mcp", format!("failed to spawn '{}': {e}", self.cmd)))?;

        let request = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let mut line = serde_json::to_string(&request)
            .map_err(|e| Error::execution("mcp", format!("failed to encode request: {e}")))?;
        line.push('\n');

        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| Error::execution("mcp", "child process has no stdin"))?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::execution("mcp", format!("failed to write request: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::execution("mcp", "child process has no stdout"))?;
        let mut reader = BufReader::new(stdout);
        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .await
            .map_err(|e| Error::execution("mcp", format!("failed to read response: {e}")))?;

        let _ = child.start_kill();
        serde_json::from_str(response_line.trim())
            .map_err(|e| Error::execution("mcp", format!("invalid JSON-RPC response: {e}")))
    }
}

struct HttpSession {
    url: String,
    bearer: Option<String>,
}

impl HttpSession {
    fn new(url: String, bearer: Option<String>) -> Self {
        HttpSession { url, bearer }
    }
}

#[async_trait]
impl McpTransport for HttpSession {
    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let client = reqwest::Client::new();
        let mut builder = client
            .post(&self.url)
            .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params }));
        if let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| Error::execution("mcp", format!("request failed: {e}")))?;
        response
            .json()
            .await
            .map_err(|e| Error::execution("mcp", format!("invalid JSON response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parse_rejects_unknown_names() {
        assert!(Target::parse("bogus").is_err());
        assert_eq!(Target::parse("tool").unwrap().method(), "tools/call");
    }

    #[test]
    fn body_arguments_parse_json_object_or_fall_back_to_string() {
        assert_eq!(parse_body_arguments(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_body_arguments("plain-name"), json!("plain-name"));
        assert_eq!(parse_body_arguments(""), serde_json::Value::Null);
    }

    #[tokio::test]
    async fn execute_without_cmd_or_url_is_an_error() {
        let ext = McpExtension;
        let ctx = ExecutorContext::new(crate::resolver::Scopes::new(crate::resolver::GlobalScope::new()));
        let err = ext.execute(&ctx, "", &HashMap::new()).await;
        assert!(err.is_err());
    }
}
