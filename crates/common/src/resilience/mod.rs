//! Resilience patterns for outbound marketplace traffic
//!
//! This module provides **generic, reusable** building blocks that the
//! request executor composes explicitly:
//! - **Retry**: bounded retry with exponential backoff and jitter, driven by a
//!   pluggable [`RetryPolicy`]
//! - **Throttle**: a FIFO-fair token bucket that bounds both the request rate
//!   and the number of requests in flight
//! - **Clock**: time abstraction so expiry logic can be tested with
//!   [`MockClock`]
//!
//! None of these types know about HTTP clients or credentials. The retry
//! policy for HTTP-shaped failures ([`policies::StatusCodeRetry`]) only needs
//! the error to implement [`policies::HttpFailure`].

pub mod clock;
pub mod retry;
pub mod throttle;

pub use clock::{Clock, MockClock, SystemClock};
pub use retry::{
    is_retryable_status, policies, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder,
    RetryDecision, RetryError, RetryExecutor, RetryPolicy, RetryResult, RETRYABLE_STATUS_CODES,
};
pub use throttle::{
    ThrottleBudget, ThrottleConfig, ThrottleConfigBuilder, ThrottleError, ThrottleTicket,
    Throttler,
};
