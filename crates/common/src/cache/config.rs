//! Cache configuration types
//!
//! Expiry is decided per entry by a [`TtlPolicy`] supplied with each insert;
//! [`CacheConfig`] only bounds capacity and picks what to evict when full.

use std::time::Duration;

/// Lifetime of a single cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlPolicy {
    /// Never expires within the process lifetime (catalog metadata)
    Invariant,
    /// Expires once older than the given duration (market data, listings)
    TimeBound(Duration),
}

impl TtlPolicy {
    /// Whether an entry of the given age is past its lifetime
    pub fn is_expired(&self, age: Duration) -> bool {
        match self {
            Self::Invariant => false,
            Self::TimeBound(ttl) => age > *ttl,
        }
    }
}

/// Eviction policy applied when the cache reaches `max_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Evict the least recently read entry
    #[default]
    Lru,
    /// Evict the oldest inserted entry
    Fifo,
    /// Never evict; inserts beyond capacity are dropped
    None,
}

/// Configuration for cache behavior
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries (None = unlimited)
    pub max_size: Option<usize>,

    /// Eviction policy when max_size is reached
    pub eviction_policy: EvictionPolicy,

    /// Whether to collect hit/miss metrics
    pub track_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_size: Some(4096), eviction_policy: EvictionPolicy::Lru, track_metrics: true }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Bounded LRU cache
    pub fn lru(max_size: usize) -> Self {
        Self { max_size: Some(max_size), ..Self::default() }
    }

    /// Cache without a capacity bound
    pub fn unbounded() -> Self {
        Self { max_size: None, eviction_policy: EvictionPolicy::None, ..Self::default() }
    }
}

/// Builder for CacheConfig
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = Some(size);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.config.max_size = None;
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    pub fn track_metrics(mut self, enabled: bool) -> Self {
        self.config.track_metrics = enabled;
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }
}
