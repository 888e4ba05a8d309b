use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Hit, miss and latency counters for the asset cache
#[derive(Debug, Default)]
pub struct CacheMetrics {
    load_latencies: RwLock<HashMap<String, Duration>>,
    load_counts: RwLock<HashMap<String, u64>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed fetch of `path`
    pub fn record_load(&self, path: &str, latency: Duration) {
        self.load_latencies.write().insert(path.to_string(), latency);
        *self.load_counts.write().entry(path.to_string()).or_insert(0) += 1;
    }

    /// A request served without a new fetch
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A request that started a fetch
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get the cache hit rate as a percentage
    pub fn cache_hit_rate(&self) -> f32 {
        let hits = self.hits() as f32;
        let misses = self.misses() as f32;

        if hits + misses > 0.0 {
            hits / (hits + misses) * 100.0
        } else {
            0.0
        }
    }

    /// Latency of the most recent completed fetch of `path`
    pub fn load_latency(&self, path: &str) -> Option<Duration> {
        self.load_latencies.read().get(path).copied()
    }

    /// Completed fetches of `path`, successful or not
    pub fn load_count(&self, path: &str) -> u64 {
        self.load_counts.read().get(path).copied().unwrap_or(0)
    }
}
