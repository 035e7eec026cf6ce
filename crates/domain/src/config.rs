//! Configuration structures
//!
//! Plain serde structs with defaults. Loading from the environment or a file
//! lives in `stockx-infra`; these types only describe and validate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_AUTH_URL, DEFAULT_BATCH_SIZE, DEFAULT_CACHE_CAPACITY,
    DEFAULT_CREDENTIAL_SKEW_SECS, DEFAULT_CURRENCY, DEFAULT_MAX_CONCURRENT_REQUESTS,
    DEFAULT_MAX_PARALLEL, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INITIAL_SECS, DEFAULT_POLL_MAX_SECS,
    DEFAULT_POLL_TIMEOUT_SECS, DEFAULT_REQUESTS_PER_SECOND, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_SECS, DEFAULT_RETRY_MAX_DELAY_SECS,
    DEFAULT_RETRY_TOTAL_SECS, MARKET_DATA_TTL_SECS,
};
use crate::errors::{Result, StockxError};
use crate::types::FeeSchedule;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockxConfig {
    pub credentials: CredentialsConfig,
    pub api: ApiConfig,
    pub throttle: ThrottleSettings,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub batch: BatchConfig,
    pub fees: FeeSchedule,
    pub inventory: InventoryConfig,
    pub logging: LoggingConfig,
}

impl StockxConfig {
    /// Reject configurations the engine cannot run with.
    ///
    /// # Errors
    /// [`StockxError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let credentials = &self.credentials;
        for (name, value) in [
            ("credentials.api_key", &credentials.api_key),
            ("credentials.client_id", &credentials.client_id),
            ("credentials.client_secret", &credentials.client_secret),
            ("credentials.refresh_token", &credentials.refresh_token),
        ] {
            if value.trim().is_empty() {
                return Err(StockxError::Config(format!("{name} must not be empty")));
            }
        }

        let non_zero = [
            ("throttle.max_concurrent", self.throttle.max_concurrent as u64),
            ("throttle.burst", u64::from(self.throttle.burst)),
            ("throttle.refill_amount", u64::from(self.throttle.refill_amount)),
            ("throttle.refill_interval_ms", self.throttle.refill_interval_ms),
            ("retry.max_attempts", u64::from(self.retry.max_attempts)),
            ("cache.capacity", self.cache.capacity as u64),
            ("batch.batch_size", self.batch.batch_size as u64),
            ("batch.max_parallel", self.batch.max_parallel as u64),
            ("batch.poll_initial_ms", self.batch.poll_initial_ms),
            ("inventory.page_size", u64::from(self.inventory.page_size)),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(StockxError::Config(format!("{name} must be greater than zero")));
        }

        if self.batch.poll_max_ms < self.batch.poll_initial_ms {
            return Err(StockxError::Config(
                "batch.poll_max_ms must not be below batch.poll_initial_ms".into(),
            ));
        }
        if self.inventory.currency.trim().is_empty() {
            return Err(StockxError::Config("inventory.currency must not be empty".into()));
        }
        Ok(())
    }
}

/// API credentials. `Debug` redacts every secret.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub api_key: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &str| if value.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("CredentialsConfig")
            .field("api_key", &redact(&self.api_key))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub auth_url: String,
    pub request_timeout_secs: u64,
    /// Treat the access token as expired this many seconds early
    pub credential_skew_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_skew_secs: DEFAULT_CREDENTIAL_SKEW_SECS,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn credential_skew(&self) -> Duration {
        Duration::from_secs(self.credential_skew_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub max_concurrent: usize,
    pub burst: u32,
    pub refill_amount: u32,
    pub refill_interval_ms: u64,
    /// `None` waits indefinitely
    pub acquire_timeout_secs: Option<u64>,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_REQUESTS,
            burst: 1,
            refill_amount: DEFAULT_REQUESTS_PER_SECOND,
            refill_interval_ms: 1_000,
            acquire_timeout_secs: Some(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Total time budget across attempts; `None` for unlimited
    pub max_total_secs: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_SECS * 1_000,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_SECS * 1_000,
            max_total_secs: Some(DEFAULT_RETRY_TOTAL_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
    pub market_data_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { capacity: DEFAULT_CACHE_CAPACITY, market_data_ttl_secs: MARKET_DATA_TTL_SECS }
    }
}

impl CacheSettings {
    pub fn market_data_ttl(&self) -> Duration {
        Duration::from_secs(self.market_data_ttl_secs)
    }
}

/// Batch submission and polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Submissions and polls in flight at once
    pub max_parallel: usize,
    pub poll_initial_ms: u64,
    pub poll_max_ms: u64,
    pub poll_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_parallel: DEFAULT_MAX_PARALLEL,
            poll_initial_ms: DEFAULT_POLL_INITIAL_SECS * 1_000,
            poll_max_ms: DEFAULT_POLL_MAX_SECS * 1_000,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
        }
    }
}

impl BatchConfig {
    pub fn poll_initial(&self) -> Duration {
        Duration::from_millis(self.poll_initial_ms)
    }

    pub fn poll_max(&self) -> Duration {
        Duration::from_millis(self.poll_max_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub currency: String,
    pub page_size: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self { currency: DEFAULT_CURRENCY.to_string(), page_size: DEFAULT_PAGE_SIZE }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> StockxConfig {
        StockxConfig {
            credentials: CredentialsConfig {
                api_key: "key".into(),
                client_id: "client".into(),
                client_secret: "secret".into(),
                refresh_token: "refresh".into(),
            },
            ..StockxConfig::default()
        }
    }

    #[test]
    fn test_defaults_are_valid_once_credentials_set() {
        assert!(valid().validate().is_ok());
        assert_eq!(valid().batch.batch_size, 100);
        assert_eq!(valid().cache.market_data_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_empty_credentials() {
        let err = StockxConfig::default().validate().unwrap_err();
        assert!(matches!(err, StockxError::Config(msg) if msg.contains("api_key")));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let mut config = valid();
        config.batch.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch.batch_size"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", valid().credentials);
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("client"));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: StockxConfig = serde_json::from_str(r#"{"batch": {"batch_size": 25}}"#).unwrap();
        assert_eq!(config.batch.batch_size, 25);
        assert_eq!(config.batch.max_parallel, DEFAULT_MAX_PARALLEL);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }
}
