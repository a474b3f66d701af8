//! TTL cache layer
//!
//! Read-side accelerator in front of the store — never authoritative.
//! Entries die by TTL expiry or by explicit invalidation from a mutating
//! path; they are never mutated in place. List caches go stale faster
//! than single-entity caches, so each cache class carries its own TTL.

pub mod metrics;

pub use metrics::{AtomicMetrics, MetricsSink};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Logical cache classes, each with an independently tunable TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheClass {
    /// Single entity (`request:<id>`, `order:<id>`)
    Entity,
    /// Active requests for one table (`active-requests:<table>`)
    ActiveList,
    /// Active requests across all tables (`active-requests`)
    AllActive,
}

impl CacheClass {
    pub const COUNT: usize = 3;

    pub(crate) fn idx(self) -> usize {
        match self {
            CacheClass::Entity => 0,
            CacheClass::ActiveList => 1,
            CacheClass::AllActive => 2,
        }
    }
}

/// Per-class TTLs
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub entity_ttl: Duration,
    pub active_list_ttl: Duration,
    pub all_active_ttl: Duration,
}

impl CacheConfig {
    pub fn ttl_for(&self, class: CacheClass) -> Duration {
        match class {
            CacheClass::Entity => self.entity_ttl,
            CacheClass::ActiveList => self.active_list_ttl,
            CacheClass::AllActive => self.all_active_ttl,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_ttl: Duration::from_secs(300),
            active_list_ttl: Duration::from_secs(30),
            all_active_ttl: Duration::from_secs(15),
        }
    }
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: usize,
}

struct CacheEntry {
    value: String,
    class: CacheClass,
    expires_at: Instant,
}

/// Key-value cache with per-entry TTL and hit/miss instrumentation
#[derive(Clone)]
pub struct CacheLayer {
    inner: Arc<RwLock<HashMap<String, CacheEntry>>>,
    config: CacheConfig,
    /// Own counters backing [`CacheLayer::stats`].
    counters: Arc<AtomicMetrics>,
    /// External sink, mirrored on every hit/miss.
    metrics: Arc<dyn MetricsSink>,
}

impl CacheLayer {
    pub fn new(config: CacheConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            config,
            counters: Arc::new(AtomicMetrics::default()),
            metrics,
        }
    }

    /// Default config with a private [`AtomicMetrics`] sink.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default(), Arc::new(AtomicMetrics::default()))
    }

    /// The injected sink, for read paths that want to observe query time.
    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    /// Look up a key. An expired entry counts as a miss and is removed.
    pub async fn get(&self, class: CacheClass, key: &str) -> Option<String> {
        let expired = {
            let inner = self.inner.read().await;
            match inner.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    self.counters.incr_cache_hit(class);
                    self.metrics.incr_cache_hit(class);
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            let mut inner = self.inner.write().await;
            // Re-check under the write lock; a writer may have refreshed it.
            if inner
                .get(key)
                .is_some_and(|e| e.expires_at <= Instant::now())
            {
                inner.remove(key);
            }
        }
        self.counters.incr_cache_miss(class);
        self.metrics.incr_cache_miss(class);
        None
    }

    /// Store a value, overwriting any previous entry. `ttl` of `None`
    /// uses the class default.
    pub async fn set(&self, class: CacheClass, key: &str, value: String, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or_else(|| self.config.ttl_for(class));
        let mut inner = self.inner.write().await;
        inner.insert(
            key.to_string(),
            CacheEntry {
                value,
                class,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Explicit invalidation — mutating paths call this for every key that
    /// depends on the mutated entity.
    pub async fn delete(&self, key: &str) {
        let mut inner = self.inner.write().await;
        inner.remove(key);
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.clear();
    }

    /// Overall statistics snapshot; entry count only includes live
    /// (non-expired) entries, same as [`CacheLayer::class_stats`].
    pub async fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let inner = self.inner.read().await;
        CacheStats {
            hits: self.counters.total_hits(),
            misses: self.counters.total_misses(),
            entry_count: inner.values().filter(|e| e.expires_at > now).count(),
        }
    }

    /// Statistics for one cache class; entry count only includes live
    /// (non-expired) entries.
    pub async fn class_stats(&self, class: CacheClass) -> CacheStats {
        let now = Instant::now();
        let inner = self.inner.read().await;
        CacheStats {
            hits: self.counters.hits(class),
            misses: self.counters.misses(class),
            entry_count: inner
                .values()
                .filter(|e| e.class == class && e.expires_at > now)
                .count(),
        }
    }

    /// Typed read helper: deserialize a cached JSON payload.
    pub async fn get_json<T: DeserializeOwned>(&self, class: CacheClass, key: &str) -> Option<T> {
        let raw = self.get(class, key).await?;
        serde_json::from_str(&raw).ok()
    }

    /// Typed write-through helper: serialize and store. Serialization
    /// failure just skips the cache — the store stays authoritative.
    pub async fn set_json<T: Serialize>(&self, class: CacheClass, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(class, key, raw, None).await,
            Err(e) => tracing::warn!(key, error = %e, "failed to serialize cache value"),
        }
    }
}

/// Cache key scheme shared by the engines.
pub mod keys {
    pub const ALL_ACTIVE_REQUESTS: &str = "active-requests";

    pub fn request(id: i64) -> String {
        format!("request:{id}")
    }

    pub fn order(id: i64) -> String {
        format!("order:{id}")
    }

    pub fn active_requests(table_number: i64) -> String {
        format!("active-requests:{table_number}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_ttl_cache() -> CacheLayer {
        CacheLayer::new(
            CacheConfig {
                entity_ttl: Duration::from_millis(40),
                active_list_ttl: Duration::from_millis(20),
                all_active_ttl: Duration::from_millis(20),
            },
            Arc::new(AtomicMetrics::default()),
        )
    }

    #[tokio::test]
    async fn get_set_delete_clear() {
        let cache = CacheLayer::with_defaults();

        assert!(cache.get(CacheClass::Entity, "request:1").await.is_none());

        cache
            .set(CacheClass::Entity, "request:1", "{\"id\":1}".into(), None)
            .await;
        assert_eq!(
            cache.get(CacheClass::Entity, "request:1").await.as_deref(),
            Some("{\"id\":1}")
        );

        cache.delete("request:1").await;
        assert!(cache.get(CacheClass::Entity, "request:1").await.is_none());

        cache
            .set(CacheClass::Entity, "a", "1".into(), None)
            .await;
        cache
            .set(CacheClass::ActiveList, "b", "2".into(), None)
            .await;
        cache.clear().await;
        assert_eq!(cache.stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn entries_expire_by_ttl() {
        let cache = short_ttl_cache();

        cache
            .set(CacheClass::ActiveList, "active-requests:5", "[]".into(), None)
            .await;
        assert!(
            cache
                .get(CacheClass::ActiveList, "active-requests:5")
                .await
                .is_some()
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(
            cache
                .get(CacheClass::ActiveList, "active-requests:5")
                .await
                .is_none()
        );
        // Expired entry was removed, not left behind.
        assert_eq!(cache.stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn stats_count_only_live_entries() {
        let cache = short_ttl_cache();

        cache.set(CacheClass::Entity, "a", "1".into(), None).await;
        cache
            .set(CacheClass::ActiveList, "b", "2".into(), None)
            .await;
        assert_eq!(cache.stats().await.entry_count, 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Expired entries are excluded even before a get purges them, and
        // the overall and per-class snapshots agree.
        assert_eq!(cache.stats().await.entry_count, 0);
        assert_eq!(cache.class_stats(CacheClass::Entity).await.entry_count, 0);
    }

    #[tokio::test]
    async fn hit_miss_counters_are_segmented_by_class() {
        let cache = CacheLayer::with_defaults();

        cache.get(CacheClass::Entity, "request:1").await; // miss
        cache
            .set(CacheClass::Entity, "request:1", "x".into(), None)
            .await;
        cache.get(CacheClass::Entity, "request:1").await; // hit
        cache.get(CacheClass::AllActive, keys::ALL_ACTIVE_REQUESTS).await; // miss

        let entity = cache.class_stats(CacheClass::Entity).await;
        assert_eq!((entity.hits, entity.misses), (1, 1));

        let all_active = cache.class_stats(CacheClass::AllActive).await;
        assert_eq!((all_active.hits, all_active.misses), (0, 1));

        let total = cache.stats().await;
        assert_eq!((total.hits, total.misses, total.entry_count), (1, 2, 1));
    }

    #[tokio::test]
    async fn injected_sink_observes_hits_and_misses() {
        let sink = Arc::new(AtomicMetrics::default());
        let cache = CacheLayer::new(CacheConfig::default(), sink.clone());
        let other = CacheLayer::with_defaults();

        cache.get(CacheClass::Entity, "k").await;
        other.get(CacheClass::Entity, "k").await;

        // Sinks are instance-scoped, not global.
        assert_eq!(sink.misses(CacheClass::Entity), 1);
        assert_eq!(sink.total_hits(), 0);
    }

    #[tokio::test]
    async fn overwrite_replaces_entry_and_ttl() {
        let cache = short_ttl_cache();

        cache
            .set(CacheClass::Entity, "k", "old".into(), None)
            .await;
        cache
            .set(
                CacheClass::Entity,
                "k",
                "new".into(),
                Some(Duration::from_secs(60)),
            )
            .await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Default entity TTL (40ms) would have expired; the explicit TTL wins.
        assert_eq!(cache.get(CacheClass::Entity, "k").await.as_deref(), Some("new"));
    }
}
