//! Outbound request throttling
//!
//! [`Throttler`] combines two limits:
//! - a token bucket that admits at most `burst` requests at once and refills
//!   `refill_amount` tokens every `refill_interval`, bounding the request rate;
//! - a fair semaphore bounding the number of tickets outstanding at any time.
//!
//! Waiters are served in arrival order (tokio's semaphore and mutex are both
//! FIFO). A rate token is spent when a ticket is issued and comes back only
//! through refill, so a caller that fails after acquiring cannot leak rate
//! capacity. The concurrency slot is returned exactly once, when the
//! [`ThrottleTicket`] is released or dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Errors raised while acquiring a throttle ticket
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ThrottleError {
    /// No capacity became available within the acquire bound
    #[error("Throttle capacity not available within {waited:?}")]
    Timeout { waited: Duration },

    /// The slot semaphore was closed
    #[error("Throttler is closed")]
    Closed,
}

/// Configuration for throttling behavior
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Maximum number of tickets outstanding at once
    pub max_concurrent: usize,
    /// Bucket size: requests admitted back to back after an idle period
    pub burst: u32,
    /// Tokens added per refill interval
    pub refill_amount: u32,
    /// Refill period
    pub refill_interval: Duration,
    /// Optional bound on how long `acquire` may wait
    pub acquire_timeout: Option<Duration>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            burst: 1,
            refill_amount: 1,
            refill_interval: Duration::from_secs(1),
            acquire_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl ThrottleConfig {
    /// Create a new configuration builder
    pub fn builder() -> ThrottleConfigBuilder {
        ThrottleConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be greater than 0".to_string());
        }
        if self.burst == 0 {
            return Err("burst must be greater than 0".to_string());
        }
        if self.refill_amount == 0 {
            return Err("refill_amount must be greater than 0".to_string());
        }
        if self.refill_interval.is_zero() {
            return Err("refill_interval must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Builder for ThrottleConfig
#[derive(Debug, Default)]
pub struct ThrottleConfigBuilder {
    config: ThrottleConfig,
}

impl ThrottleConfigBuilder {
    pub fn new() -> Self {
        Self { config: ThrottleConfig::default() }
    }

    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.config.max_concurrent = max;
        self
    }

    pub fn burst(mut self, burst: u32) -> Self {
        self.config.burst = burst;
        self
    }

    /// Refill `amount` tokens every `interval`
    pub fn refill(mut self, amount: u32, interval: Duration) -> Self {
        self.config.refill_amount = amount;
        self.config.refill_interval = interval;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = Some(timeout);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.config.acquire_timeout = None;
        self
    }

    pub fn build(self) -> Result<ThrottleConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Point-in-time view of the shared throttle budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThrottleBudget {
    /// Tickets that could be issued right now without waiting for a slot
    pub available_slots: usize,
    /// Rate tokens currently in the bucket (0 while a waiter holds the bucket)
    pub available_tokens: u32,
    /// Tokens added per window
    pub refill_rate: u32,
    /// Refill window
    pub window: Duration,
    /// Tickets issued since creation
    pub total_acquired: u64,
    /// Acquisitions abandoned because of the acquire timeout
    pub timed_out: u64,
}

/// Capacity unit held for the duration of one outbound request.
///
/// Dropping the ticket returns its concurrency slot.
#[derive(Debug)]
#[must_use = "dropping the ticket releases the throttle slot immediately"]
pub struct ThrottleTicket {
    _permit: OwnedSemaphorePermit,
    issued_at: Instant,
}

impl ThrottleTicket {
    /// How long this ticket has been held
    pub fn held_for(&self) -> Duration {
        self.issued_at.elapsed()
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Token-bucket throttler shared by every request of one client
#[derive(Debug)]
pub struct Throttler {
    config: ThrottleConfig,
    slots: Arc<Semaphore>,
    bucket: Mutex<Bucket>,
    total_acquired: AtomicU64,
    timed_out: AtomicU64,
}

impl Throttler {
    /// Create a throttler, rejecting invalid configurations
    pub fn new(config: ThrottleConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            slots: Arc::new(Semaphore::new(config.max_concurrent)),
            bucket: Mutex::new(Bucket { tokens: config.burst, last_refill: Instant::now() }),
            total_acquired: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            config,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Wait for a ticket.
    ///
    /// Suspends only the calling task. Fails with [`ThrottleError::Timeout`]
    /// when `acquire_timeout` elapses first; an abandoned wait consumes
    /// nothing.
    #[instrument(skip(self), level = "debug")]
    pub async fn acquire(&self) -> Result<ThrottleTicket, ThrottleError> {
        let wait = async {
            let permit =
                Arc::clone(&self.slots).acquire_owned().await.map_err(|_| ThrottleError::Closed)?;
            self.take_token().await;
            Ok::<_, ThrottleError>(ThrottleTicket { _permit: permit, issued_at: Instant::now() })
        };

        let ticket = match self.config.acquire_timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result?,
                Err(_) => {
                    self.timed_out.fetch_add(1, Ordering::Relaxed);
                    warn!(waited = ?limit, "throttle acquire timed out");
                    return Err(ThrottleError::Timeout { waited: limit });
                }
            },
            None => wait.await?,
        };

        self.total_acquired.fetch_add(1, Ordering::Relaxed);
        debug!("throttle ticket issued");
        Ok(ticket)
    }

    /// Return a ticket's capacity. Equivalent to dropping it.
    pub fn release(&self, ticket: ThrottleTicket) {
        debug!(held_for = ?ticket.held_for(), "throttle ticket released");
        drop(ticket);
    }

    /// Snapshot of the shared budget
    pub fn budget(&self) -> ThrottleBudget {
        let available_tokens = self.bucket.try_lock().map_or(0, |mut bucket| {
            self.refill(&mut bucket);
            bucket.tokens
        });
        ThrottleBudget {
            available_slots: self.slots.available_permits(),
            available_tokens,
            refill_rate: self.config.refill_amount,
            window: self.config.refill_interval,
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }

    async fn take_token(&self) {
        // Holding the bucket lock across the sleep keeps waiters in FIFO order.
        let mut bucket = self.bucket.lock().await;
        loop {
            self.refill(&mut bucket);
            if bucket.tokens > 0 {
                bucket.tokens -= 1;
                return;
            }
            let next_refill = bucket.last_refill + self.config.refill_interval;
            tokio::time::sleep_until(next_refill).await;
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let interval = self.config.refill_interval;
        let elapsed = bucket.last_refill.elapsed();
        let intervals = elapsed.as_nanos() / interval.as_nanos();
        if intervals == 0 {
            return;
        }

        let intervals = u32::try_from(intervals).unwrap_or(u32::MAX);
        let added = intervals.saturating_mul(self.config.refill_amount);
        bucket.tokens = bucket.tokens.saturating_add(added).min(self.config.burst);
        bucket.last_refill += interval.saturating_mul(intervals);
    }
}
