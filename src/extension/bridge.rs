//! `bridge` executor (spec §4.3 / §8 scenario S3): rewrites the body into
//! a URL the *outer* database can pull results from over HTTP, choosing a
//! query mode and the negotiated format+encoding.

use super::{ExecutorContext, Extension};
use crate::error::Result;
use crate::resolver::OptionSpec;
use crate::result::QueryResult;
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

/// Bridge query mode (spec §4.3): direct, submit, async, batch, mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Direct,
    Submit,
    Async,
    Batch,
    Mutation,
}

impl Mode {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "s" | "submit" => Mode::Submit,
            "a" | "async" => Mode::Async,
            "b" | "batch" => Mode::Batch,
            "mutation" => Mode::Mutation,
            _ => Mode::Direct,
        }
    }

    fn token(&self) -> &'static str {
        match self {
            Mode::Direct => "d",
            Mode::Submit => "s",
            Mode::Async => "a",
            Mode::Batch => "b",
            Mode::Mutation => "mutation",
        }
    }
}

pub struct BridgeExtension;

#[async_trait]
impl Extension for BridgeExtension {
    fn name(&self) -> &'static str {
        "bridge"
    }

    fn default_options(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::new("base.url", "bridge server base URL", "http://127.0.0.1:8080/"),
            OptionSpec::new("m", "d|s|a|b|mutation query mode", "d"),
            OptionSpec::new("f", "negotiated result format", "csv"),
            OptionSpec::new("c", "negotiated compression", "none"),
            OptionSpec::new("qid", "query id to reuse; generated when absent", ""),
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
        let base_url = options.get("base.url").map(|s| s.as_str()).unwrap_or("http://127.0.0.1:8080/");
        let mode = Mode::parse(options.get("m").map(|s| s.as_str()).unwrap_or("d"));
        let format = options.get("f").map(|s| s.as_str()).unwrap_or("csv");
        let compression = options.get("c").map(|s| s.as_str()).unwrap_or("none");
        let qid = options
            .get("qid")
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let url = render_url(base_url, &qid, mode, format, compression, body);
        Ok(QueryResult::scalar_str(url))
    }
}

fn render_url(base_url: &str, qid: &str, mode: Mode, format: &str, compression: &str, body: &str) -> String {
    let separator = if base_url.ends_with('/') { "" } else { "/" };
    let mut url = format!("{base_url}{separator}{qid}.{format}");
    if compression != "none" && !compression.is_empty() {
        url.push('.');
        url.push_str(compression);
    }
    url.push_str(&format!("?m={}", mode.token()));
    if !body.trim().is_empty() {
        url.push_str("&q=");
        url.push_str(&percent_encoding::utf8_percent_encode(body.trim(), percent_encoding::NON_ALPHANUMERIC).to_string());
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{GlobalScope, Scopes};

    fn ctx() -> ExecutorContext {
        ExecutorContext::new(Scopes::new(GlobalScope::new()))
    }

    #[tokio::test]
    async fn s3_scenario_renders_direct_mode_csv_url() {
        let ext = BridgeExtension;
        let mut opts = HashMap::new();
        opts.insert("base.url".to_string(), "http://bridge/".to_string());
        opts.insert("qid".to_string(), "xyz".to_string());
        opts.insert("f".to_string(), "csv".to_string());
        let mut r = ext.execute(&ctx(), "select 1", &opts).await.unwrap();
        let (_, rows) = r.as_fields_and_rows().unwrap();
        let url = match &rows[0][0] {
            crate::value::Value::Str(s) => s.clone(),
            _ => panic!("expected string"),
        };
        assert!(url.starts_with("http://bridge/xyz.csv?m=d&q="));
    }

    #[test]
    fn mode_token_round_trips_recognized_letters() {
        assert_eq!(Mode::parse("s").token(), "s");
        assert_eq!(Mode::parse("async").token(), "a");
        assert_eq!(Mode::parse("unknown").token(), "d");
    }

    #[test]
    fn compression_none_is_omitted_from_url() {
        let url = render_url("http://bridge/", "q1", Mode::Direct, "csv", "none", "select 1");
        assert!(!url.contains(".none"));
    }
}
