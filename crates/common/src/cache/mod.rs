//! Response caching for immutable and slowly changing remote resources
//!
//! [`ResponseCache`] memoizes responses keyed by resource identity (for
//! example a product id). The caller chooses a [`TtlPolicy`] per entry:
//! catalog metadata is [`TtlPolicy::Invariant`] and lives for the process,
//! market data uses a short [`TtlPolicy::TimeBound`] lifetime, and resources
//! that must always be fresh simply bypass the cache.
//!
//! # Features
//!
//! - **Concurrent**: `tokio::sync::RwLock` guards the storage; entries are
//!   written whole
//! - **Bounded**: optional capacity with LRU or FIFO eviction
//! - **Observable**: hit/miss/eviction counters via [`CacheStats`]
//! - **Testable**: [`Clock`](crate::resilience::Clock) abstraction for TTL
//!   tests without sleeping

pub mod config;
pub mod response_cache;
pub mod stats;

pub use config::{CacheConfig, CacheConfigBuilder, EvictionPolicy, TtlPolicy};
pub use response_cache::ResponseCache;
pub use stats::CacheStats;
