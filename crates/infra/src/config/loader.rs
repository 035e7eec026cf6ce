//! Configuration loader
//!
//! Loads engine configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the environment, if one exists
//! 2. Attempts to load from `STOCKX_*` environment variables
//! 3. If the credentials are incomplete, falls back to loading from file
//! 4. Probes multiple paths for config files
//! 5. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! Required:
//! - `STOCKX_API_KEY`: API key sent as `x-api-key`
//! - `STOCKX_CLIENT_ID`: OAuth client id
//! - `STOCKX_CLIENT_SECRET`: OAuth client secret
//! - `STOCKX_REFRESH_TOKEN`: OAuth refresh token
//!
//! Optional overrides (defaults otherwise):
//! - `STOCKX_API_BASE_URL`, `STOCKX_AUTH_URL`
//! - `STOCKX_REQUEST_TIMEOUT_SECS`
//! - `STOCKX_MAX_CONCURRENT_REQUESTS`, `STOCKX_REQUESTS_PER_SECOND`
//! - `STOCKX_RETRY_MAX_ATTEMPTS`
//! - `STOCKX_BATCH_SIZE`, `STOCKX_BATCH_MAX_PARALLEL`, `STOCKX_BATCH_POLL_TIMEOUT_SECS`
//! - `STOCKX_CURRENCY`, `STOCKX_PAGE_SIZE`
//! - `STOCKX_LOG_LEVEL`, `STOCKX_LOG_FORMAT` (`pretty` or `json`)
//!
//! ## File Locations
//! `STOCKX_CONFIG` names a file explicitly. Otherwise the loader probes the
//! following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./stockx.json` or `./stockx.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use stockx_domain::{LogFormat, Result, StockxConfig, StockxError};

const CONFIG_PATH_VAR: &str = "STOCKX_CONFIG";

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `StockxError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Validation fails
pub fn load() -> Result<StockxConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            let explicit = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
            load_from_file(explicit)
        }
    }
}

/// Load configuration from environment variables
///
/// The four credential variables must be present. Every other setting
/// starts from its default and may be overridden.
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `StockxError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<StockxConfig> {
    let mut config = StockxConfig::default();
    config.credentials.api_key = env_var("STOCKX_API_KEY")?;
    config.credentials.client_id = env_var("STOCKX_CLIENT_ID")?;
    config.credentials.client_secret = env_var("STOCKX_CLIENT_SECRET")?;
    config.credentials.refresh_token = env_var("STOCKX_REFRESH_TOKEN")?;

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut StockxConfig) -> Result<()> {
    if let Some(url) = env_opt("STOCKX_API_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(url) = env_opt("STOCKX_AUTH_URL") {
        config.api.auth_url = url;
    }
    if let Some(secs) = env_parse("STOCKX_REQUEST_TIMEOUT_SECS")? {
        config.api.request_timeout_secs = secs;
    }

    if let Some(max) = env_parse("STOCKX_MAX_CONCURRENT_REQUESTS")? {
        config.throttle.max_concurrent = max;
    }
    if let Some(rate) = env_parse("STOCKX_REQUESTS_PER_SECOND")? {
        config.throttle.refill_amount = rate;
        config.throttle.burst = rate;
        config.throttle.refill_interval_ms = 1_000;
    }
    if let Some(attempts) = env_parse("STOCKX_RETRY_MAX_ATTEMPTS")? {
        config.retry.max_attempts = attempts;
    }

    if let Some(size) = env_parse("STOCKX_BATCH_SIZE")? {
        config.batch.batch_size = size;
    }
    if let Some(parallel) = env_parse("STOCKX_BATCH_MAX_PARALLEL")? {
        config.batch.max_parallel = parallel;
    }
    if let Some(secs) = env_parse("STOCKX_BATCH_POLL_TIMEOUT_SECS")? {
        config.batch.poll_timeout_secs = secs;
    }

    if let Some(currency) = env_opt("STOCKX_CURRENCY") {
        config.inventory.currency = currency.to_ascii_uppercase();
    }
    if let Some(size) = env_parse("STOCKX_PAGE_SIZE")? {
        config.inventory.page_size = size;
    }

    if let Some(level) = env_opt("STOCKX_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env_opt("STOCKX_LOG_FORMAT") {
        config.logging.format = match format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            other => {
                return Err(StockxError::Config(format!("Invalid STOCKX_LOG_FORMAT: {other}")))
            }
        };
    }
    Ok(())
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `StockxError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<StockxConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StockxError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            StockxError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| StockxError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`). Missing
/// sections and fields take their defaults.
///
/// # Errors
/// Returns `StockxError::Config` if format is invalid or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<StockxConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StockxError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| StockxError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(StockxError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./config.{json,toml}`,
///    `./stockx.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("stockx.json"),
        dir.join("stockx.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `StockxError::Config` if the variable is not set or blank.
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        StockxError::Config(format!("Missing required environment variable: {}", key))
    })
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `StockxError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| StockxError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CREDENTIAL_VARS: [(&str, &str); 4] = [
        ("STOCKX_API_KEY", "key"),
        ("STOCKX_CLIENT_ID", "client"),
        ("STOCKX_CLIENT_SECRET", "secret"),
        ("STOCKX_REFRESH_TOKEN", "refresh"),
    ];

    fn set_credentials() {
        for (key, value) in CREDENTIAL_VARS {
            std::env::set_var(key, value);
        }
    }

    fn clear(keys: &[&str]) {
        for (key, _) in CREDENTIAL_VARS {
            std::env::remove_var(key);
        }
        for key in keys {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_env_with_credentials_only() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_credentials();

        let config = load_from_env().unwrap();
        assert_eq!(config.credentials.api_key, "key");
        assert_eq!(config.credentials.refresh_token, "refresh");
        assert_eq!(config.batch, StockxConfig::default().batch);

        clear(&[]);
    }

    #[test]
    fn test_load_from_env_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_credentials();
        std::env::set_var("STOCKX_BATCH_SIZE", "25");
        std::env::set_var("STOCKX_CURRENCY", "eur");
        std::env::set_var("STOCKX_LOG_FORMAT", "JSON");
        std::env::set_var("STOCKX_BATCH_POLL_TIMEOUT_SECS", "90");

        let config = load_from_env().unwrap();
        assert_eq!(config.batch.batch_size, 25);
        assert_eq!(config.inventory.currency, "EUR");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.batch.poll_timeout_secs, 90);

        clear(&[
            "STOCKX_BATCH_SIZE",
            "STOCKX_CURRENCY",
            "STOCKX_LOG_FORMAT",
            "STOCKX_BATCH_POLL_TIMEOUT_SECS",
        ]);
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_credentials();
        std::env::remove_var("STOCKX_CLIENT_SECRET");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, StockxError::Config(msg) if msg.contains("STOCKX_CLIENT_SECRET")));

        clear(&[]);
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_credentials();
        std::env::set_var("STOCKX_BATCH_SIZE", "lots");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, StockxError::Config(msg) if msg.contains("STOCKX_BATCH_SIZE")));

        clear(&["STOCKX_BATCH_SIZE"]);
    }

    #[test]
    fn test_load_from_env_rejects_zero_batch_size() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_credentials();
        std::env::set_var("STOCKX_BATCH_SIZE", "0");

        let err = load_from_env().unwrap_err();
        assert!(err.to_string().contains("batch.batch_size"));

        clear(&["STOCKX_BATCH_SIZE"]);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_content = r#"
[credentials]
api_key = "key"
client_id = "client"
client_secret = "secret"
refresh_token = "refresh"

[batch]
batch_size = 50
"#;

        let config = parse_config(toml_content, &PathBuf::from("stockx.toml")).unwrap();
        assert_eq!(config.batch.batch_size, 50);
        assert_eq!(config.inventory.currency, "USD");
    }

    #[test]
    fn test_parse_config_json() {
        let json_content = r#"{"inventory": {"currency": "GBP", "page_size": 20}}"#;

        let config = parse_config(json_content, &PathBuf::from("config.json")).unwrap();
        assert_eq!(config.inventory.currency, "GBP");
        assert_eq!(config.inventory.page_size, 20);
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(matches!(result, Err(StockxError::Config(_))));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(matches!(result, Err(StockxError::Config(_))));
    }
}
