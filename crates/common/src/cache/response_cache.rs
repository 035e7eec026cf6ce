//! Async response cache with per-entry lifetimes.
//!
//! Entries are written whole under the write lock after the compute future
//! has resolved, so readers never observe a partially built value. Two
//! callers missing the same key at the same time may both compute; the last
//! insert wins and both receive a complete value.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::trace;

use super::config::{CacheConfig, EvictionPolicy, TtlPolicy};
use super::stats::{CacheStats, MetricsCollector};
use crate::resilience::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    ttl: TtlPolicy,
    inserted_at: Instant,
    last_accessed: Instant,
    insertion_order: u64,
}

#[derive(Debug)]
struct CacheStorage<K, V> {
    data: HashMap<K, CacheEntry<V>>,
    insertion_counter: u64,
}

/// Memoizes remote responses keyed by resource identity.
///
/// # Examples
///
/// ```
/// use stockx_common::cache::{CacheConfig, ResponseCache, TtlPolicy};
///
/// # #[tokio::main]
/// # async fn main() {
/// let cache: ResponseCache<String, u32> = ResponseCache::new(CacheConfig::lru(16));
///
/// let value = cache
///     .get_or_compute("product-1".to_string(), TtlPolicy::Invariant, || async {
///         Ok::<_, std::convert::Infallible>(7)
///     })
///     .await;
/// assert_eq!(value, Ok(7));
/// # }
/// ```
#[derive(Debug)]
pub struct ResponseCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    storage: RwLock<CacheStorage<K, V>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> ResponseCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache driven by the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> ResponseCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Creates a cache with an explicit clock.
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            storage: RwLock::new(CacheStorage { data: HashMap::new(), insertion_counter: 0 }),
            metrics: MetricsCollector::new(config.track_metrics),
            config,
            clock,
        }
    }

    /// Returns the cached value for `key`, or runs `compute` and caches its
    /// success under `ttl`.
    ///
    /// Errors are returned to the caller and never cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, ttl: TtlPolicy, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let value = compute().await?;
        self.insert(key, value.clone(), ttl).await;
        Ok(value)
    }

    /// Looks up a live entry, dropping it if its lifetime has elapsed.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut storage = self.storage.write().await;

        let expired = match storage.data.get_mut(key) {
            Some(entry) if !entry.ttl.is_expired(now.duration_since(entry.inserted_at)) => {
                entry.last_accessed = now;
                self.metrics.record_hit();
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            storage.data.remove(key);
            self.metrics.record_expiration();
            trace!("cache entry expired");
        }
        self.metrics.record_miss();
        None
    }

    /// Stores `value` under `key`, evicting one entry first if at capacity.
    pub async fn insert(&self, key: K, value: V, ttl: TtlPolicy) {
        let now = self.clock.now();
        let mut storage = self.storage.write().await;

        if let Some(max_size) = self.config.max_size {
            if storage.data.len() >= max_size && !storage.data.contains_key(&key) {
                if !self.evict_one(&mut storage) {
                    return;
                }
            }
        }

        let insertion_order = storage.insertion_counter;
        storage.insertion_counter += 1;
        storage.data.insert(
            key,
            CacheEntry { value, ttl, inserted_at: now, last_accessed: now, insertion_order },
        );
        self.metrics.record_insert();
    }

    /// Explicitly evicts `key`, returning the value it held.
    pub async fn invalidate(&self, key: &K) -> Option<V> {
        self.storage.write().await.data.remove(key).map(|entry| entry.value)
    }

    /// Removes every entry.
    pub async fn clear(&self) {
        self.storage.write().await.data.clear();
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut storage = self.storage.write().await;
        let before = storage.data.len();
        storage.data.retain(|_, entry| !entry.ttl.is_expired(now.duration_since(entry.inserted_at)));
        let removed = before - storage.data.len();
        for _ in 0..removed {
            self.metrics.record_expiration();
        }
        removed
    }

    /// Current number of entries, expired or not.
    pub async fn len(&self) -> usize {
        self.storage.read().await.data.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.data.is_empty()
    }

    /// Snapshot of cache statistics. Size reads as 0 while a writer holds
    /// the lock.
    pub fn stats(&self) -> CacheStats {
        let size = self.storage.try_read().map(|s| s.data.len()).unwrap_or(0);
        self.metrics.snapshot(size, self.config.max_size)
    }

    fn evict_one(&self, storage: &mut CacheStorage<K, V>) -> bool {
        let victim = match self.config.eviction_policy {
            EvictionPolicy::Lru => storage
                .data
                .iter()
                .min_by_key(|(_, entry)| (entry.last_accessed, entry.insertion_order))
                .map(|(k, _)| k.clone()),
            EvictionPolicy::Fifo => storage
                .data
                .iter()
                .min_by_key(|(_, entry)| entry.insertion_order)
                .map(|(k, _)| k.clone()),
            EvictionPolicy::None => None,
        };

        match victim {
            Some(key) => {
                storage.data.remove(&key);
                self.metrics.record_eviction();
                true
            }
            None => false,
        }
    }
}
