//! C6: Query Cache & Lifecycle (spec §4.6 / §3 `QueryInfo`).
//!
//! Bounded LRU+TTL map keyed by `qid`, with single-flight admission and
//! one-shot result/resource binding. `moka::sync::Cache` gives the
//! bounded+TTL+LRU mechanics (the direct analogue of the source's
//! Caffeine cache); the single-flight compare-and-set and the
//! `NEW -> RUNNING -> READY -> CLOSED` monotone transition are layered on
//! top since moka doesn't model per-entry lifecycle state.

use crate::compress::Compression;
use crate::error::{Error, Result};
use crate::result::QueryResult;
use crate::serialize::Format;
use moka::sync::Cache;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotone lifecycle state (spec §5: "transitions are monotone").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    New,
    Running,
    Ready,
    Closed,
}

/// Cache entry (spec §3 `QueryInfo`).
pub struct QueryInfo {
    pub qid: String,
    pub query: String,
    pub txid: String,
    pub format: Format,
    pub compression: Compression,
    pub token: String,
    pub user: String,
    pub client: String,
    pub created_at: Instant,
    state: Mutex<QueryState>,
    result: Mutex<Option<Arc<Mutex<QueryResult>>>>,
    resources: Mutex<Option<Vec<Arc<dyn crate::result::Closable>>>>,
    subscribers: AtomicUsize,
}

impl QueryInfo {
    pub fn new(qid: impl Into<String>, query: impl Into<String>, format: Format, compression: Compression) -> Self {
        QueryInfo {
            qid: qid.into(),
            query: query.into(),
            txid: String::new(),
            format,
            compression,
            token: String::new(),
            user: String::new(),
            client: String::new(),
            created_at: Instant::now(),
            state: Mutex::new(QueryState::New),
            result: Mutex::new(None),
            resources: Mutex::new(None),
            subscribers: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> QueryState {
        *self.state.lock()
    }

    /// Advance the state machine. Transitions are monotone; attempting to
    /// move to an earlier or equal state is a no-op (the compare-and-swap
    /// the spec describes for observers, modeled here as "never regress").
    pub fn transition(&self, next: QueryState) {
        let mut state = self.state.lock();
        if rank(next) > rank(*state) {
            *state = next;
        }
    }

    /// One-shot result bind (spec: "`setResult` is one-shot; a second call
    /// fails as a programmer error").
    pub fn set_result(&self, result: QueryResult) -> Result<()> {
        let mut slot = self.result.lock();
        if slot.is_some() {
            return Err(Error::InvalidState(format!("result already set for qid '{}'", self.qid)));
        }
        *slot = Some(Arc::new(Mutex::new(result)));
        self.transition(QueryState::Ready);
        Ok(())
    }

    pub fn result(&self) -> Option<Arc<Mutex<QueryResult>>> {
        self.result.lock().clone()
    }

    /// One-shot resource bind (spec: "`setResources` likewise").
    pub fn set_resources(&self, resources: Vec<Arc<dyn crate::result::Closable>>) -> Result<()> {
        let mut slot = self.resources.lock();
        if slot.is_some() {
            return Err(Error::InvalidState(format!("resources already set for qid '{}'", self.qid)));
        }
        *slot = Some(resources);
        Ok(())
    }

    pub fn add_subscriber(&self) -> usize {
        self.subscribers.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn remove_subscriber(&self) -> usize {
        self.subscribers.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Idempotent close: releases every tracked resource even if one
    /// throws, logging failures at DEBUG and never short-circuiting
    /// (spec §4.6).
    pub fn close(&self) -> Result<()> {
        if self.state() == QueryState::Closed {
            return Ok(());
        }
        self.transition(QueryState::Closed);

        let mut first_err = None;
        if let Some(result) = self.result.lock().take() {
            if let Err(e) = result.lock().close() {
                tracing::debug!(qid = %self.qid, error = %e, "QueryResult close failed during QueryInfo.close()");
                first_err = Some(e);
            }
        }
        if let Some(resources) = self.resources.lock().take() {
            for resource in resources {
                if let Err(e) = resource.close() {
                    tracing::debug!(qid = %self.qid, error = %e, "resource close failed during QueryInfo.close()");
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn rank(state: QueryState) -> u8 {
    match state {
        QueryState::New => 0,
        QueryState::Running => 1,
        QueryState::Ready => 2,
        QueryState::Closed => 3,
    }
}

/// Metrics counters exposed at `/metrics` (spec §4.6), each an atomic.
#[derive(Default)]
pub struct CacheMetrics {
    pub requests_total: AtomicU64,
    pub requests_inflight: AtomicU64,
    pub requests_failed: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_evictions: AtomicU64,
    pub bytes_out: AtomicU64,
}

impl CacheMetrics {
    /// Plain-text exposition (spec §4.5: "admin; plain text"), one
    /// `name value` pair per line.
    pub fn render(&self) -> String {
        format!(
            "requests_total {}\nrequests_inflight {}\nrequests_failed {}\ncache_hits {}\ncache_evictions {}\nbytes_out {}\n",
            self.requests_total.load(Ordering::Relaxed),
            self.requests_inflight.load(Ordering::Relaxed),
            self.requests_failed.load(Ordering::Relaxed),
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_evictions.load(Ordering::Relaxed),
            self.bytes_out.load(Ordering::Relaxed),
        )
    }
}

/// Bounded LRU+TTL map of `qid -> QueryInfo` (spec §4.6: "Capacity
/// `server.request.limit` ..., eviction LRU once full. TTL
/// `server.request.timeout` ... applied from creation").
pub struct QueryCache {
    entries: Cache<String, Arc<QueryInfo>>,
    pub metrics: Arc<CacheMetrics>,
}

impl QueryCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let metrics = Arc::new(CacheMetrics::default());
        let eviction_metrics = metrics.clone();
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .eviction_listener(move |_key, value: Arc<QueryInfo>, _cause| {
                eviction_metrics.cache_evictions.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = value.close() {
                    tracing::debug!(qid = %value.qid, error = %e, "close failed during TTL eviction");
                }
            })
            .build();
        QueryCache { entries, metrics }
    }

    /// Single-flight admission (spec §4.6: "Insertion is compare-and-set;
    /// a second submission of the same `qid` attaches to the existing
    /// entry instead of creating one"). Returns `(info, created)`.
    pub fn admit(&self, qid: String, make: impl FnOnce() -> QueryInfo) -> (Arc<QueryInfo>, bool) {
        let mut created = false;
        let info = self.entries.get_with(qid, || {
            created = true;
            Arc::new(make())
        });
        if created {
            self.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        (info, created)
    }

    pub fn get(&self, qid: &str) -> Option<Arc<QueryInfo>> {
        self.entries.get(qid)
    }

    pub fn remove(&self, qid: &str) -> Option<Arc<QueryInfo>> {
        self.entries.remove(qid)
    }

    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Force moka to run its maintenance tasks (TTL sweep, eviction
    /// listener dispatch) synchronously, instead of waiting for the next
    /// incidental access. Tests use this to make TTL eviction
    /// deterministic rather than racing a background sweep.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_flight_admit_returns_same_entry_on_second_call() {
        let cache = QueryCache::new(100, Duration::from_secs(10));
        let (first, created1) = cache.admit("q1".to_string(), || {
            QueryInfo::new("q1", "select 1", Format::Csv, Compression::None)
        });
        let (second, created2) = cache.admit("q1".to_string(), || {
            QueryInfo::new("q1", "select 1", Format::Csv, Compression::None)
        });
        assert!(created1);
        assert!(!created2);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn set_result_twice_is_a_programmer_error() {
        let info = QueryInfo::new("q1", "select 1", Format::Csv, Compression::None);
        info.set_result(QueryResult::scalar_str("a")).unwrap();
        let err = info.set_result(QueryResult::scalar_str("b"));
        assert!(err.is_err());
    }

    #[test]
    fn close_is_idempotent_and_releases_all_resources_even_if_one_errors() {
        let info = QueryInfo::new("q1", "select 1", Format::Csv, Compression::None);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        info.set_resources(vec![
            Arc::new(|| Err(Error::InvalidState("boom".into()))),
            Arc::new(move || {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ])
        .unwrap();
        let res = info.close();
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(info.state(), QueryState::Closed);
        info.close().unwrap(); // idempotent
    }

    #[test]
    fn state_transitions_never_regress() {
        let info = QueryInfo::new("q1", "select 1", Format::Csv, Compression::None);
        info.transition(QueryState::Running);
        info.transition(QueryState::New);
        assert_eq!(info.state(), QueryState::Running);
    }

    #[test]
    fn metrics_render_as_plain_text_name_value_lines() {
        let metrics = CacheMetrics::default();
        metrics.requests_total.fetch_add(3, Ordering::Relaxed);
        let text = metrics.render();
        assert!(text.contains("requests_total 3"));
    }
}
