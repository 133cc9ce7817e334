//! `web` executor (spec §4.3): sends an HTTP request, optionally filtering
//! the JSON response through a JMESPath subset.

use super::{ExecutorContext, Extension};
use crate::error::{Error, Result};
use crate::resolver::OptionSpec;
use crate::result::QueryResult;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

pub struct WebExtension;

#[async_trait]
impl Extension for WebExtension {
    fn name(&self) -> &'static str {
        "web"
    }

    fn default_options(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::new("base.url", "base URL prepended to url.template", ""),
            OptionSpec::new("url.template", "path template appended to base.url; the block body when empty", ""),
            OptionSpec::new("request.headers", "comma-separated k=v header pairs", ""),
            OptionSpec::new("request.template", "request body template", ""),
            OptionSpec::new("result.json.path", "JMESPath-subset filter applied to a JSON response", ""),
            OptionSpec::new("proxy", "\"\" | \":\" | host:port | scheme://host:port", ""),
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
        let base_url = options.get("base.url").map(|s| s.as_str()).unwrap_or("");
        let template = options.get("url.template").map(|s| s.as_str()).unwrap_or("");
        let path = if template.is_empty() { body.trim() } else { template };
        let url = format!("{base_url}{path}");

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(60));
        if let Some(proxy_spec) = options.get("proxy") {
            if let Some(proxy) = build_proxy(proxy_spec)? {
                builder = builder.proxy(proxy);
            }
        }
        let client = builder
            .build()
            .map_err(|e| Error::execution("web", format!("failed to build http client: {e}")))?;

        let mut request = client.get(&url);
        if let Some(headers) = options.get("request.headers") {
            for pair in headers.split(',').filter(|s| !s.is_empty()) {
                if let Some((k, v)) = pair.split_once('=') {
                    request = request.header(k.trim(), v.trim());
                }
            }
        }
        let request_template = options.get("request.template").map(|s| s.as_str()).unwrap_or("");
        if !request_template.is_empty() {
            request = client.post(&url).body(request_template.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::execution("web", format!("request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::execution("web", format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(Error::execution("web", format!("HTTP {status}: {text}")));
        }

        if let Some(json_path) = options.get("result.json.path").filter(|s| !s.is_empty()) {
            let filtered = filter_json_path(&text, json_path)?;
            return Ok(QueryResult::scalar(Value::Json(filtered)));
        }
        Ok(QueryResult::scalar_str(text))
    }
}

fn build_proxy(spec: &str) -> Result<Option<reqwest::Proxy>> {
    if spec.is_empty() || spec == ":" {
        return Ok(None);
    }
    let url = if spec.contains("://") {
        spec.to_string()
    } else {
        format!("http://{spec}")
    };
    reqwest::Proxy::all(&url)
        .map(Some)
        .map_err(|e| Error::execution("web", format!("invalid proxy '{spec}': {e}")))
}

/// A restricted JMESPath subset (spec §4.3): `a.b[N].c`, `a.b[]` flatten,
/// `a.b[?cond]` a simple equality filter. Delegates to the `jmespath` crate
/// for the actual expression evaluation.
fn filter_json_path(body: &str, path: &str) -> Result<serde_json::Value> {
    let expr = jmespath::compile(path)
        .map_err(|e| Error::execution("web", format!("invalid result.json.path '{path}': {e}")))?;
    let data = jmespath::Variable::from_json(body)
        .map_err(|e| Error::execution("web", format!("response is not valid JSON: {e}")))?;
    let result = expr
        .search(data)
        .map_err(|e| Error::execution("web", format!("result.json.path evaluation failed: {e}")))?;
    serde_json::to_value(&*result)
        .map_err(|e| Error::execution("web", format!("failed to convert jmespath result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_spec_empty_or_colon_disables_proxy() {
        assert!(build_proxy("").unwrap().is_none());
        assert!(build_proxy(":").unwrap().is_none());
    }

    #[test]
    fn proxy_spec_host_port_infers_http_scheme() {
        assert!(build_proxy("proxy.example.com:8080").unwrap().is_some());
    }

    #[test]
    fn proxy_spec_with_scheme_is_used_verbatim() {
        assert!(build_proxy("socks5://proxy.example.com:1080").unwrap().is_some());
    }

    #[test]
    fn json_path_selects_nested_field() {
        let json = r#"{"a": {"b": [{"c": 1}, {"c": 2}]}}"#;
        let v = filter_json_path(json, "a.b[0].c").unwrap();
        assert_eq!(v, serde_json::json!(1));
    }

    #[test]
    fn json_path_flattens_array() {
        let json = r#"{"a": {"b": [{"c": 1}, {"c": 2}]}}"#;
        let v = filter_json_path(json, "a.b[*].c").unwrap();
        assert_eq!(v, serde_json::json!([1, 2]));
    }
}
