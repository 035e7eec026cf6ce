//! Credential data types

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bearer credential for the marketplace API.
///
/// `Debug` output redacts both tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token sent with every request
    pub access_token: String,

    /// Absolute expiration timestamp (UTC)
    pub expires_at: DateTime<Utc>,

    /// Token used to obtain the next access token
    pub refresh_token: String,
}

impl Credential {
    /// Build a credential that expires `expires_in_seconds` after `now`.
    #[must_use]
    pub fn issued_at(
        now: DateTime<Utc>,
        access_token: String,
        expires_in_seconds: i64,
        refresh_token: String,
    ) -> Self {
        Self { access_token, expires_at: now + Duration::seconds(expires_in_seconds), refresh_token }
    }

    /// Whether the token is still usable at `now`, treating the last `skew`
    /// before expiry as already expired.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, skew: std::time::Duration) -> bool {
        let skew = Duration::from_std(skew).unwrap_or_else(|_| Duration::zero());
        now < self.expires_at - skew
    }

    /// Seconds until expiry; negative once expired.
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Outcome of a successful refresh call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Present when the provider rotates the refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Lifecycle phase of the managed credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CredentialPhase {
    /// No access token obtained yet
    Unset,
    /// An access token is held
    Valid,
    /// A refresh call is in flight
    Refreshing,
    /// The last refresh attempt failed; the next request retries
    Failed,
}

/// Errors raised while obtaining a credential
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The provider refused the refresh (invalid refresh token, revoked
    /// client). Retrying with the same inputs cannot succeed.
    #[error("Credential refresh rejected: {message}")]
    Rejected { message: String },

    /// The provider could not be reached or failed transiently
    #[error("Credential provider unavailable: {message}")]
    Unavailable { message: String },
}

impl CredentialError {
    /// Whether the failure is permanent for the current inputs
    #[must_use]
    pub fn is_irrecoverable(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
