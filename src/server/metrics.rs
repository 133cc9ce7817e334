//! `/metrics` admin endpoint support (spec §4.6: "per-format histograms").
//! Wraps `cache::CacheMetrics` with a per-`Format` request counter, since
//! the cache itself is format-agnostic.

use crate::cache::CacheMetrics;
use crate::serialize::Format;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct ServerMetrics {
    pub cache: Arc<CacheMetrics>,
    by_format: DashMap<&'static str, AtomicU64>,
}

impl ServerMetrics {
    pub fn new(cache: Arc<CacheMetrics>) -> Self {
        ServerMetrics { cache, by_format: DashMap::new() }
    }

    pub fn record_response(&self, format: Format, bytes: usize) {
        self.cache.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
        self.by_format
            .entry(format.extension())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Plain-text exposition (spec §4.5: "admin; plain text").
    pub fn render(&self) -> String {
        let mut text = self.cache.render();
        for entry in self.by_format.iter() {
            text.push_str(&format!("requests_by_format{{format=\"{}\"}} {}\n", entry.key(), entry.value().load(Ordering::Relaxed)));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_bytes_and_per_format_counts() {
        let metrics = ServerMetrics::new(Arc::new(CacheMetrics::default()));
        metrics.record_response(Format::Csv, 100);
        metrics.record_response(Format::Csv, 50);
        metrics.record_response(Format::Bson, 20);
        let text = metrics.render();
        assert!(text.contains("bytes_out 170"));
        assert!(text.contains("requests_by_format{format=\"csv\"} 2"));
        assert!(text.contains("requests_by_format{format=\"bson\"} 1"));
    }
}
