//! Credential lifecycle with single-flight refresh
//!
//! At most one refresh call is in flight per manager. Every caller that needs
//! a credential while a refresh is running awaits that same call and observes
//! its outcome, success or failure. A failed refresh leaves the previously
//! stored credential untouched and the next request starts a new attempt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::traits::TokenRefresher;
use super::types::{Credential, CredentialError, CredentialPhase};
use crate::resilience::{Clock, SystemClock};

type RefreshFuture = Shared<BoxFuture<'static, Result<Credential, CredentialError>>>;

/// Tuning for [`CredentialManager`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialManagerConfig {
    /// Treat a token as expired this long before its real expiry
    pub expiry_skew: Duration,
    /// Background refresh wait after a failed attempt
    pub failure_backoff: Duration,
}

impl Default for CredentialManagerConfig {
    fn default() -> Self {
        Self { expiry_skew: Duration::from_secs(60), failure_backoff: Duration::from_secs(60) }
    }
}

#[derive(Debug)]
struct CredentialState {
    current: Option<Credential>,
    refresh_token: String,
    phase: CredentialPhase,
}

/// Owns the bearer credential and refreshes it on demand.
pub struct CredentialManager<C: Clock + Clone = SystemClock> {
    refresher: Arc<dyn TokenRefresher>,
    state: Arc<RwLock<CredentialState>>,
    inflight: Mutex<Option<RefreshFuture>>,
    config: CredentialManagerConfig,
    clock: C,
    refresh_count: Arc<AtomicU64>,
}

impl CredentialManager<SystemClock> {
    /// Create a manager holding only a refresh token. The first request
    /// triggers a refresh.
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        refresh_token: impl Into<String>,
        config: CredentialManagerConfig,
    ) -> Self {
        Self::with_clock(refresher, refresh_token, config, SystemClock)
    }
}

impl<C: Clock + Clone> CredentialManager<C> {
    pub fn with_clock(
        refresher: Arc<dyn TokenRefresher>,
        refresh_token: impl Into<String>,
        config: CredentialManagerConfig,
        clock: C,
    ) -> Self {
        Self {
            refresher,
            state: Arc::new(RwLock::new(CredentialState {
                current: None,
                refresh_token: refresh_token.into(),
                phase: CredentialPhase::Unset,
            })),
            inflight: Mutex::new(None),
            config,
            clock,
            refresh_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Seed an access token obtained out of band.
    #[must_use]
    pub fn with_credential(self, credential: Credential) -> Self {
        if let Ok(mut state) = self.state.try_write() {
            state.refresh_token.clone_from(&credential.refresh_token);
            state.current = Some(credential);
            state.phase = CredentialPhase::Valid;
        }
        self
    }

    pub fn config(&self) -> &CredentialManagerConfig {
        &self.config
    }

    /// Return a credential that is valid for at least the configured skew,
    /// refreshing it first if needed.
    ///
    /// # Errors
    /// Returns the refresh failure. Concurrent callers waiting on the same
    /// refresh all receive the same error.
    pub async fn get_valid_credential(&self) -> Result<Credential, CredentialError> {
        if let Some(credential) = self.cached_valid().await {
            return Ok(credential);
        }

        let refresh = {
            let mut slot = self.inflight.lock().await;
            // Another caller may have finished a refresh while we waited.
            if let Some(credential) = self.cached_valid().await {
                return Ok(credential);
            }
            match slot.as_ref() {
                Some(running) if running.peek().is_none() => running.clone(),
                _ => {
                    let started = self.start_refresh();
                    *slot = Some(started.clone());
                    started
                }
            }
        };

        let outcome = refresh.clone().await;

        let mut slot = self.inflight.lock().await;
        if slot.as_ref().is_some_and(|running| running.ptr_eq(&refresh)) {
            *slot = None;
        }
        outcome
    }

    /// Drop the current access token so the next request refreshes.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        if state.current.take().is_some() {
            debug!("Access token invalidated");
        }
        if state.phase == CredentialPhase::Valid {
            state.phase = CredentialPhase::Unset;
        }
    }

    /// Invalidate only if `access_token` is still the stored token.
    ///
    /// A request rejected with a stale token must not discard a token that a
    /// concurrent refresh has already replaced.
    pub async fn invalidate_token(&self, access_token: &str) -> bool {
        let mut state = self.state.write().await;
        let matches =
            state.current.as_ref().is_some_and(|current| current.access_token == access_token);
        if matches {
            state.current = None;
            state.phase = CredentialPhase::Unset;
            debug!("Rejected access token invalidated");
        }
        matches
    }

    pub async fn phase(&self) -> CredentialPhase {
        self.state.read().await.phase
    }

    pub async fn current_credential(&self) -> Option<Credential> {
        self.state.read().await.current.clone()
    }

    /// Number of refresh calls issued so far
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// Spawn a task that refreshes shortly before each expiry.
    ///
    /// The task runs until the returned handle is aborted.
    pub fn start_auto_refresh(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Starting credential auto-refresh task");
            loop {
                let wait = self.time_until_refresh().await;
                if !wait.is_zero() {
                    debug!(wait_secs = wait.as_secs(), "Auto-refresh sleeping");
                    tokio::time::sleep(wait).await;
                }

                if let Err(err) = self.get_valid_credential().await {
                    warn!(error = %err, "Auto-refresh failed");
                    if err.is_irrecoverable() {
                        return;
                    }
                    tokio::time::sleep(self.config.failure_backoff).await;
                }
            }
        })
    }

    async fn time_until_refresh(&self) -> Duration {
        let state = self.state.read().await;
        let Some(current) = state.current.as_ref() else {
            return Duration::ZERO;
        };
        let skew = i64::try_from(self.config.expiry_skew.as_secs()).unwrap_or(i64::MAX);
        let remaining = current.seconds_until_expiry(self.clock.utc_now()).saturating_sub(skew);
        u64::try_from(remaining).map(Duration::from_secs).unwrap_or(Duration::ZERO)
    }

    async fn cached_valid(&self) -> Option<Credential> {
        let state = self.state.read().await;
        state
            .current
            .as_ref()
            .filter(|credential| credential.is_valid_at(self.clock.utc_now(), self.config.expiry_skew))
            .cloned()
    }

    fn start_refresh(&self) -> RefreshFuture {
        let refresher = Arc::clone(&self.refresher);
        let state = Arc::clone(&self.state);
        let counter = Arc::clone(&self.refresh_count);
        let clock = self.clock.clone();

        async move {
            let refresh_token = {
                let mut guard = state.write().await;
                guard.phase = CredentialPhase::Refreshing;
                guard.refresh_token.clone()
            };

            counter.fetch_add(1, Ordering::SeqCst);
            debug!("Refreshing access token");

            match refresher.refresh(&refresh_token).await {
                Ok(refreshed) => {
                    let credential = Credential::issued_at(
                        clock.utc_now(),
                        refreshed.access_token,
                        refreshed.expires_in,
                        refreshed.refresh_token.unwrap_or(refresh_token),
                    );
                    let mut guard = state.write().await;
                    guard.refresh_token.clone_from(&credential.refresh_token);
                    guard.current = Some(credential.clone());
                    guard.phase = CredentialPhase::Valid;
                    info!(expires_at = %credential.expires_at, "Access token refreshed");
                    Ok(credential)
                }
                Err(err) => {
                    state.write().await.phase = CredentialPhase::Failed;
                    warn!(error = %err, "Access token refresh failed");
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl<C: Clock + Clone> std::fmt::Debug for CredentialManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("config", &self.config)
            .field("refresh_count", &self.refresh_count())
            .finish_non_exhaustive()
    }
}
