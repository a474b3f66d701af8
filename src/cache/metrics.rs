//! Injected metrics sink
//!
//! The cache never owns global counters; callers hand it a sink so tests
//! can observe isolated instances.

use super::CacheClass;
use std::sync::atomic::{AtomicU64, Ordering};

/// Observability hooks for the cache and the read paths behind it.
pub trait MetricsSink: Send + Sync {
    fn incr_cache_hit(&self, class: CacheClass);
    fn incr_cache_miss(&self, class: CacheClass);
    fn observe_query_time_ms(&self, ms: u64);
}

/// Default in-process sink backed by atomic counters.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    hits: [AtomicU64; CacheClass::COUNT],
    misses: [AtomicU64; CacheClass::COUNT],
    query_count: AtomicU64,
    query_time_total_ms: AtomicU64,
}

impl AtomicMetrics {
    pub fn hits(&self, class: CacheClass) -> u64 {
        self.hits[class.idx()].load(Ordering::Relaxed)
    }

    pub fn misses(&self, class: CacheClass) -> u64 {
        self.misses[class.idx()].load(Ordering::Relaxed)
    }

    pub fn total_hits(&self) -> u64 {
        self.hits.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn total_misses(&self) -> u64 {
        self.misses.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::Relaxed)
    }

    pub fn query_time_total_ms(&self) -> u64 {
        self.query_time_total_ms.load(Ordering::Relaxed)
    }
}

impl MetricsSink for AtomicMetrics {
    fn incr_cache_hit(&self, class: CacheClass) {
        self.hits[class.idx()].fetch_add(1, Ordering::Relaxed);
    }

    fn incr_cache_miss(&self, class: CacheClass) {
        self.misses[class.idx()].fetch_add(1, Ordering::Relaxed);
    }

    fn observe_query_time_ms(&self, ms: u64) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.query_time_total_ms.fetch_add(ms, Ordering::Relaxed);
    }
}
