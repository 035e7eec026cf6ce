//! Shared building blocks for the StockX engine crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error types and plain data helpers
//! - `runtime`: async infrastructure (resilience, response cache, credential
//!   lifecycle)
//! - `observability`: tracing instrumentation (pulled in by `runtime`)
//! - `test-utils`: deterministic clocks and helpers for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod auth;
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use auth::{
    Credential, CredentialError, CredentialManager, CredentialManagerConfig, CredentialPhase,
    RefreshedToken, TokenRefresher,
};
#[cfg(feature = "runtime")]
pub use cache::{CacheConfig, CacheStats, EvictionPolicy, ResponseCache, TtlPolicy};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffStrategy, Clock, Jitter, MockClock, RetryConfig, RetryConfigBuilder, RetryDecision,
    RetryError, RetryExecutor, RetryPolicy, RetryResult, SystemClock, ThrottleBudget,
    ThrottleConfig, ThrottleError, ThrottleTicket, Throttler,
};
