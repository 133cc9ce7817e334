//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! Bridge HTTP server (spec §4.5): endpoint table, query modes, and the
//! per-request execution flow (auth -> ACL -> cache admit -> dispatch ->
//! stream -> close).

use super::auth::check_bearer;
use super::metrics::ServerMetrics;
use super::negotiate::{negotiate_compression, negotiate_format, NegotiationInput};
use crate::acl::ServerAcl;
use crate::cache::{QueryCache, QueryInfo, QueryState};
use crate::compress::{self, Compression};
use crate::config::ConfigManager;
use crate::error::Error;
use crate::extension::{ExecutorContext, Registry};
use crate::parser::VariableTag;
use crate::resolver::{GlobalScope, Scopes};
use crate::result::QueryResult;
use crate::serialize::{serializer_for, Format};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Query mode (spec §4.5, header `x-query-mode` or param `m`). Distinct
/// from `extension::bridge::Mode` (the client-side URL-builder's lenient
/// defaulting parse): an inbound request with an unrecognized mode is a
/// client error (spec §9 open question 2), not a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Submit,
    Redirect,
    Direct,
    Async,
    Batch,
    Mutation,
}

impl QueryMode {
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "s" | "submit" => Ok(QueryMode::Submit),
            "r" | "redirect" => Ok(QueryMode::Redirect),
            "d" | "direct" => Ok(QueryMode::Direct),
            "a" | "async" => Ok(QueryMode::Async),
            "b" | "batch" => Ok(QueryMode::Batch),
            "mutation" => Ok(QueryMode::Mutation),
            other => Err(Error::Parse(format!("unrecognized query mode '{other}'"))),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub cache: Arc<QueryCache>,
    pub acl: Arc<ServerAcl>,
    pub auth_token: Option<Arc<str>>,
    pub metrics: Arc<ServerMetrics>,
    pub scopes: Scopes,
    pub config: Arc<ConfigManager>,
    pub default_tag: VariableTag,
    pub poll_interval: Duration,
}

impl AppState {
    pub fn new(registry: Registry, cache: QueryCache, acl: ServerAcl, config: ConfigManager) -> Self {
        let cache = Arc::new(cache);
        let cache_metrics = cache.metrics.clone();
        AppState {
            registry: Arc::new(registry),
            cache,
            acl: Arc::new(acl),
            auth_token: None,
            metrics: Arc::new(ServerMetrics::new(cache_metrics)),
            scopes: Scopes::new(GlobalScope::new()),
            config: Arc::new(config),
            default_tag: VariableTag::Brace,
            poll_interval: Duration::from_millis(5),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<Arc<str>>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/config", get(get_config))
        .route("/metrics", get(get_metrics))
        .route("/", post(submit_or_run).get(run_from_query))
        .route("/:path", get(fetch_by_path).head(head_by_path))
        .with_state(state)
}

#[derive(Debug, Deserialize, Default)]
pub struct QueryParams {
    pub q: Option<String>,
    pub qid: Option<String>,
    pub m: Option<String>,
    pub f: Option<String>,
    pub c: Option<String>,
    pub u: Option<String>,
    pub txid: Option<String>,
    #[allow(dead_code)]
    pub a: Option<String>,
}

fn bearer_header(headers: &HeaderMap) -> Option<String> {
    headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn client_ip(connect_info: &Option<ConnectInfo<SocketAddr>>) -> Option<std::net::IpAddr> {
    connect_info.map(|ConnectInfo(addr)| addr.ip())
}

async fn get_config(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = check_bearer(state.auth_token.as_deref(), bearer_header(&headers).as_deref()) {
        return error_response(e);
    }
    let snapshot = state.config.snapshot();
    let mut text = String::new();
    for (k, v) in snapshot.iter() {
        text.push_str(&format!("{k}={v}\n"));
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], text).into_response()
}

async fn get_metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = check_bearer(state.auth_token.as_deref(), bearer_header(&headers).as_deref()) {
        return error_response(e);
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], state.metrics.render()).into_response()
}

async fn submit_or_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Response {
    let query = String::from_utf8_lossy(&body).into_owned();
    handle(state, headers, connect_info, RequestSource { q: Some(query), qid: None, m: None, f: None, c: None, txid: None }).await
}

async fn run_from_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(params): Query<QueryParams>,
) -> Response {
    handle(
        state,
        headers,
        connect_info,
        RequestSource { q: params.q, qid: params.qid, m: params.m, f: params.f, c: params.c, txid: params.txid },
    )
    .await
}

struct RequestSource {
    q: Option<String>,
    qid: Option<String>,
    m: Option<String>,
    f: Option<String>,
    c: Option<String>,
    txid: Option<String>,
}

fn header_or_param(headers: &HeaderMap, name: &str, param: Option<String>) -> Option<String> {
    // Query parameter values supersede headers only when the header is absent (spec §6).
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(param)
}

async fn handle(
    state: AppState,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    source: RequestSource,
) -> Response {
    if let Err(e) = check_bearer(state.auth_token.as_deref(), bearer_header(&headers).as_deref()) {
        return error_response(e);
    }

    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    if !state.acl.permit(host, client_ip(&connect_info)) {
        return error_response(Error::Acl);
    }

    let mode_token = header_or_param(&headers, "x-query-mode", source.m).unwrap_or_else(|| "d".to_string());
    let mode = match QueryMode::parse(&mode_token) {
        Ok(m) => m,
        Err(e) => return error_response(e),
    };

    let query_text = source.q.unwrap_or_default();
    let qid = header_or_param(&headers, "x-query-id", source.qid).unwrap_or_else(|| Uuid::new_v4().to_string());
    let txid = header_or_param(&headers, "x-transaction-id", source.txid).unwrap_or_default();

    let f_param = header_or_param(&headers, "f", source.f);
    let c_param = header_or_param(&headers, "c", source.c);
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()).map(str::to_string);
    let accept_encoding = headers.get(header::ACCEPT_ENCODING).and_then(|v| v.to_str().ok()).map(str::to_string);
    let negotiation = NegotiationInput {
        accept_header: accept.as_deref(),
        accept_encoding_header: accept_encoding.as_deref(),
        f_param: f_param.as_deref(),
        c_param: c_param.as_deref(),
        ..Default::default()
    };
    let format = negotiate_format(&negotiation);
    let compression = negotiate_compression(&negotiation);

    let state_for_producer = state.clone();
    let qid_for_key = qid.clone();
    let (info, created) = state.cache.admit(qid_for_key, || {
        let mut info = QueryInfo::new(qid.clone(), query_text.clone(), format, compression);
        info.txid = txid.clone();
        info
    });

    if created {
        let producer_info = info.clone();
        let run_now = async move {
            producer_info.transition(QueryState::Running);
            let ctx = ExecutorContext::new(state_for_producer.scopes.clone());
            let connection_properties = HashMap::new();
            let outcome = crate::pipeline::run(
                &producer_info.query,
                state_for_producer.default_tag,
                crate::parser::DEFAULT_ESCAPE,
                &state_for_producer.registry,
                &ctx,
                &connection_properties,
            )
            .await;
            match outcome {
                Ok(result) => {
                    let _ = producer_info.set_result(result);
                }
                Err(e) => {
                    tracing::warn!(qid = %producer_info.qid, error = %e, "executor failed");
                    let _ = producer_info.set_result(QueryResult::scalar_str(e.to_string()));
                }
            }
        };

        match mode {
            QueryMode::Async | QueryMode::Redirect | QueryMode::Submit => {
                tokio::spawn(run_now);
            }
            QueryMode::Direct | QueryMode::Batch | QueryMode::Mutation => {
                run_now.await;
            }
        }
    }

    match mode {
        QueryMode::Submit => submitted_response(&info, format, compression),
        QueryMode::Redirect => redirect_response(&info, format, compression),
        QueryMode::Async => submitted_response(&info, format, compression),
        QueryMode::Direct | QueryMode::Batch | QueryMode::Mutation => {
            await_and_stream(&state, &info, format, compression).await
        }
    }
}

fn submitted_response(info: &QueryInfo, format: Format, compression: Compression) -> Response {
    (
        StatusCode::OK,
        [(header::HeaderName::from_static("x-query-id"), info.qid.clone())],
        render_bridge_url(info, format, compression),
    )
        .into_response()
}

fn redirect_response(info: &QueryInfo, format: Format, compression: Compression) -> Response {
    let location = render_bridge_url(info, format, compression);
    (
        StatusCode::FOUND,
        [(header::LOCATION, location), (header::HeaderName::from_static("x-query-id"), info.qid.clone())],
    )
        .into_response()
}

fn render_bridge_url(info: &QueryInfo, format: Format, compression: Compression) -> String {
    let mut url = format!("/{}.{}", info.qid, format.extension());
    if compression != Compression::None {
        url.push('.');
        url.push_str(compression.extension());
    }
    url.push_str("?m=d");
    url
}

async fn await_and_stream(state: &AppState, info: &Arc<QueryInfo>, format: Format, compression: Compression) -> Response {
    if wait_until_ready(info, state.poll_interval, Duration::from_secs(30)).await.is_err() {
        return error_response(Error::Timeout(Duration::from_secs(30)));
    }
    stream_response(state, info, format, compression).await
}

async fn wait_until_ready(info: &QueryInfo, poll: Duration, timeout: Duration) -> Result<(), ()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if info.state() == QueryState::Ready {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(());
        }
        tokio::time::sleep(poll).await;
    }
}

async fn stream_response(state: &AppState, info: &QueryInfo, format: Format, compression: Compression) -> Response {
    let Some(result) = info.result() else {
        return error_response(Error::InvalidState("result missing after ready transition".into()));
    };
    let encoded = {
        let mut guard = result.lock();
        let (fields, rows) = match guard.as_fields_and_rows() {
            Ok(v) => v,
            Err(e) => return error_response(e),
        };
        match serializer_for(format).encode(&fields, &rows, &HashMap::new()) {
            Ok(b) => b,
            Err(e) => return error_response(e),
        }
    };

    let compressed = match compress::compress(compression, &encoded).await {
        Ok(b) => b,
        Err(e) => return error_response(e),
    };
    state.metrics.record_response(format, compressed.len());

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, format.mime().parse().unwrap());
    response_headers.insert(header::HeaderName::from_static("accept-ranges"), "none".parse().unwrap());
    response_headers.insert(header::CONNECTION, "close".parse().unwrap());
    if let Ok(value) = info.qid.parse() {
        response_headers.insert(header::HeaderName::from_static("x-query-id"), value);
    }
    if compression != Compression::None {
        response_headers.insert(header::CONTENT_ENCODING, compression.http_encoding().parse().unwrap());
    }
    (StatusCode::OK, response_headers, compressed).into_response()
}

async fn fetch_by_path(State(state): State<AppState>, Path(path): Path<String>, headers: HeaderMap) -> Response {
    fetch_or_probe(state, path, headers, false).await
}

async fn head_by_path(State(state): State<AppState>, Path(path): Path<String>, headers: HeaderMap) -> Response {
    fetch_or_probe(state, path, headers, true).await
}

/// `{qid}[.format][.encoding]` (spec §6 path conventions).
fn split_qid_path(path: &str) -> (String, Option<String>, Option<String>) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let qid = parts.remove(0).to_string();
    let format_ext = if !parts.is_empty() && Format::parse(parts[0]).is_ok() { Some(parts.remove(0).to_string()) } else { None };
    let compression_ext = if !parts.is_empty() && Compression::parse(parts[0]).is_ok() { Some(parts.remove(0).to_string()) } else { None };
    (qid, format_ext, compression_ext)
}

async fn fetch_or_probe(state: AppState, path: String, headers: HeaderMap, head_only: bool) -> Response {
    if let Err(e) = check_bearer(state.auth_token.as_deref(), bearer_header(&headers).as_deref()) {
        return error_response(e);
    }
    let (qid, format_ext, compression_ext) = split_qid_path(&path);
    let Some(info) = state.cache.get(&qid) else {
        return (StatusCode::NOT_FOUND, "unknown qid").into_response();
    };

    let negotiation = NegotiationInput {
        path_format_ext: format_ext.as_deref(),
        path_compression_ext: compression_ext.as_deref(),
        ..Default::default()
    };
    let format = if format_ext.is_some() { negotiate_format(&negotiation) } else { info.format };
    let compression = if compression_ext.is_some() { negotiate_compression(&negotiation) } else { info.compression };

    if head_only {
        return match info.state() {
            QueryState::Ready => StatusCode::OK.into_response(),
            QueryState::Closed => StatusCode::NOT_FOUND.into_response(),
            _ => StatusCode::ACCEPTED.into_response(),
        };
    }
    await_and_stream(&state, &info, format, compression).await
}

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::Parse(_) => StatusCode::BAD_REQUEST,
        Error::Auth => StatusCode::UNAUTHORIZED,
        Error::Acl => StatusCode::FORBIDDEN,
        Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        Error::CacheFull => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::UNAUTHORIZED {
        // Spec §8: "Bearer token mismatch -> 401 with no response body; never 500."
        return status.into_response();
    }
    (status, err.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(Registry::with_builtins(), QueryCache::new(100, Duration::from_secs(10)), ServerAcl::new(), {
            ConfigManager::load(None, HashMap::new()).unwrap()
        })
    }

    #[tokio::test]
    async fn s3_scenario_direct_mode_csv_round_trip() {
        let app = router(test_state());
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/?m=d")
            .header("accept", "text/csv")
            .body(axum::body::Body::from("select '{{ script: 1 }}'"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/csv");
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn unauthorized_bearer_yields_401_with_empty_body() {
        let state = test_state().with_auth_token("secret");
        let app = router(state);
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/metrics")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_qid_is_404() {
        let app = router(test_state());
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/does-not-exist.csv")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_query_mode_is_400() {
        let app = router(test_state());
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/?q=select+1&m=bogus")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
