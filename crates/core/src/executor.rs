//! Request execution engine
//!
//! Composes the standalone resilience components around every remote call:
//!
//! ```text
//! cache lookup ─► credential ─► ┌ throttle ticket ─► transport ─► release ┐ ─► cache fill
//!                               └──────────── retry policy ◄──────────────┘
//! ```
//!
//! A 401 invalidates the credential once and re-resolves it before `Auth`
//! is surfaced. Cached values are stored as `serde_json::Value` so a single
//! cache serves every response type.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use stockx_common::auth::{CredentialError, CredentialManager, CredentialManagerConfig, TokenRefresher};
use stockx_common::cache::{CacheConfig, CacheStats, ResponseCache, TtlPolicy};
use stockx_common::resilience::policies::{HttpFailure, StatusCodeRetry};
use stockx_common::resilience::{
    RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy, ThrottleBudget,
    ThrottleConfig, ThrottleError, Throttler,
};
use stockx_domain::{Result, StockxConfig, StockxError};
use tracing::{debug, instrument, warn, Instrument};
use uuid::Uuid;

/// Describes one logical remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    /// Operation name recorded on the tracing span
    pub name: &'static str,
    /// Cache key and lifetime; `None` for uncacheable calls
    pub cache: Option<(String, TtlPolicy)>,
}

impl RequestSpec {
    pub fn new(name: &'static str) -> Self {
        Self { name, cache: None }
    }

    #[must_use]
    pub fn cached(mut self, key: impl Into<String>, ttl: TtlPolicy) -> Self {
        self.cache = Some((key.into(), ttl));
        self
    }
}

/// Classifies [`StockxError`] with the shared status-code policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockxRetryPolicy;

struct Classified<'a>(&'a StockxError);

impl HttpFailure for Classified<'_> {
    fn status(&self) -> Option<u16> {
        match self.0 {
            StockxError::Remote { status, .. } | StockxError::Transient { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    fn is_connection_failure(&self) -> bool {
        matches!(self.0, StockxError::Network(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self.0 {
            StockxError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl RetryPolicy<StockxError> for StockxRetryPolicy {
    fn should_retry(&self, error: &StockxError, attempt: u32) -> RetryDecision {
        StatusCodeRetry.should_retry(&Classified(error), attempt)
    }
}

/// Runs remote calls under credential, throttle, retry and cache control.
///
/// Cheap to share: clone the `Arc` handles into several executors to share
/// one credential, throttle budget and cache across clients.
pub struct RequestExecutor {
    credentials: Arc<CredentialManager>,
    throttler: Arc<Throttler>,
    retry: RetryExecutor<StockxRetryPolicy>,
    cache: Arc<ResponseCache<String, serde_json::Value>>,
}

impl RequestExecutor {
    pub fn new(
        credentials: Arc<CredentialManager>,
        throttler: Arc<Throttler>,
        retry: RetryConfig,
        cache: Arc<ResponseCache<String, serde_json::Value>>,
    ) -> Self {
        Self { credentials, throttler, retry: RetryExecutor::new(retry, StockxRetryPolicy), cache }
    }

    /// Build every component from configuration.
    ///
    /// # Errors
    /// [`StockxError::Config`] when the throttle or retry settings are
    /// invalid.
    pub fn from_config(config: &StockxConfig, refresher: Arc<dyn TokenRefresher>) -> Result<Self> {
        let credentials = CredentialManager::new(
            refresher,
            config.credentials.refresh_token.clone(),
            CredentialManagerConfig {
                expiry_skew: config.api.credential_skew(),
                ..CredentialManagerConfig::default()
            },
        );

        let throttle = &config.throttle;
        let mut throttle_builder = ThrottleConfig::builder()
            .max_concurrent(throttle.max_concurrent)
            .burst(throttle.burst)
            .refill(throttle.refill_amount, Duration::from_millis(throttle.refill_interval_ms));
        throttle_builder = match throttle.acquire_timeout_secs {
            Some(secs) => throttle_builder.acquire_timeout(Duration::from_secs(secs)),
            None => throttle_builder.no_timeout(),
        };
        let throttler = throttle_builder
            .build()
            .and_then(Throttler::new)
            .map_err(|err| StockxError::Config(format!("throttle: {err}")))?;

        let retry = &config.retry;
        let mut retry_builder = RetryConfig::builder()
            .max_attempts(retry.max_attempts)
            .exponential_backoff(
                Duration::from_millis(retry.base_delay_ms),
                2.0,
                Duration::from_millis(retry.max_delay_ms),
            )
            .full_jitter();
        retry_builder = match retry.max_total_secs {
            Some(secs) => retry_builder.max_total_time(Duration::from_secs(secs)),
            None => retry_builder.unlimited_time(),
        };
        let retry = retry_builder
            .build()
            .map_err(|err| StockxError::Config(format!("retry: {err}")))?;

        let cache = ResponseCache::new(CacheConfig::lru(config.cache.capacity));

        Ok(Self::new(Arc::new(credentials), Arc::new(throttler), retry, Arc::new(cache)))
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    pub fn throttle_budget(&self) -> ThrottleBudget {
        self.throttler.budget()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop one cached response.
    pub async fn invalidate_cached(&self, key: &str) {
        self.cache.invalidate(&key.to_string()).await;
    }

    /// Execute `transport` under the full request pipeline.
    ///
    /// `transport` receives the bearer token and is invoked once per attempt.
    ///
    /// # Errors
    /// `Auth` when no valid credential can be obtained or the API keeps
    /// rejecting it, `ThrottleTimeout`, `RetryExhausted` wrapping the last
    /// transient failure, or the terminal error returned by the transport.
    pub async fn call<T, F, Fut>(&self, spec: RequestSpec, transport: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = tracing::info_span!(
            "remote_call",
            operation = spec.name,
            request_id = %Uuid::now_v7(),
            cached = spec.cache.is_some(),
        );
        self.call_inner(spec, transport).instrument(span).await
    }

    async fn call_inner<T, F, Fut>(&self, spec: RequestSpec, transport: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some((key, _)) = &spec.cache {
            if let Some(value) = self.cache.get(key).await {
                match serde_json::from_value(value) {
                    Ok(hit) => {
                        debug!("served from cache");
                        return Ok(hit);
                    }
                    Err(err) => {
                        warn!(error = %err, "cached value has unexpected shape, refetching");
                        self.cache.invalidate(key).await;
                    }
                }
            }
        }

        let value = self.call_authenticated(&transport).await?;

        if let Some((key, ttl)) = spec.cache {
            match serde_json::to_value(&value) {
                Ok(json) => self.cache.insert(key, json, ttl).await,
                Err(err) => warn!(error = %err, "response not cacheable"),
            }
        }
        Ok(value)
    }

    async fn call_authenticated<T, F, Fut>(&self, transport: &F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut reauthenticated = false;
        loop {
            let credential =
                self.credentials.get_valid_credential().await.map_err(credential_error)?;

            match self.call_with_retry(&credential.access_token, transport).await {
                Err(StockxError::Auth(message)) if !reauthenticated => {
                    warn!(%message, "credential rejected, refreshing once");
                    self.credentials.invalidate_token(&credential.access_token).await;
                    reauthenticated = true;
                }
                outcome => return outcome,
            }
        }
    }

    #[instrument(skip_all, level = "debug")]
    async fn call_with_retry<T, F, Fut>(&self, token: &str, transport: &F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = AtomicU32::new(0);
        let throttler = &self.throttler;
        let attempts_ref = &attempts;

        let outcome = self
            .retry
            .execute(move || async move {
                attempts_ref.fetch_add(1, Ordering::Relaxed);
                let ticket = throttler.acquire().await.map_err(throttle_error)?;
                let result = transport(token.to_string()).await;
                throttler.release(ticket);
                result
            })
            .await;

        outcome.map_err(|err| retry_error(err, attempts.load(Ordering::Relaxed)))
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("retry", self.retry.config())
            .field("throttle", &self.throttler.budget())
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

fn credential_error(err: CredentialError) -> StockxError {
    match err {
        CredentialError::Rejected { message } => StockxError::Auth(message),
        CredentialError::Unavailable { message } => {
            StockxError::Network(format!("credential refresh failed: {message}"))
        }
    }
}

fn throttle_error(err: ThrottleError) -> StockxError {
    match err {
        ThrottleError::Timeout { waited } => StockxError::ThrottleTimeout { waited },
        ThrottleError::Closed => StockxError::Config("throttler closed".into()),
    }
}

fn retry_error(err: RetryError<StockxError>, attempts: u32) -> StockxError {
    match err {
        RetryError::Exhausted { attempts, last } => {
            StockxError::RetryExhausted { attempts, last: Box::new(last) }
        }
        RetryError::NonRetryable { error, .. } => error,
        RetryError::TimeoutExceeded { last: Some(last), .. } => {
            StockxError::RetryExhausted { attempts, last: Box::new(last) }
        }
        RetryError::TimeoutExceeded { elapsed, last: None } => {
            StockxError::Network(format!("retry budget exhausted after {elapsed:?}"))
        }
        RetryError::InvalidConfiguration { message } => StockxError::Config(message),
    }
}
