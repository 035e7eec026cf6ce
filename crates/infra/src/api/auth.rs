//! OAuth refresh-token exchange
//!
//! Implements [`TokenRefresher`] against the marketplace's token endpoint.
//! Scheduling, single-flight and expiry live in the credential manager; this
//! type performs exactly one exchange per call.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use stockx_common::auth::{CredentialError, RefreshedToken, TokenRefresher};
use stockx_domain::constants::AUTH_AUDIENCE;
use stockx_domain::{CredentialsConfig, StockxConfig, StockxError};
use tracing::{debug, info, instrument};

use crate::http::client::error_for_status;
use crate::http::HttpClient;

const GRANT_TYPE: &str = "refresh_token";
/// Lifetime assumed when the provider omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Exchanges the configured client credentials and a refresh token for an
/// access token.
#[derive(Clone)]
pub struct OAuthRefresher {
    http: HttpClient,
    auth_url: String,
    client_id: String,
    client_secret: String,
    audience: String,
}

impl OAuthRefresher {
    pub fn new(http: HttpClient, auth_url: impl Into<String>, credentials: &CredentialsConfig) -> Self {
        Self {
            http,
            auth_url: auth_url.into(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            audience: AUTH_AUDIENCE.to_string(),
        }
    }

    /// # Errors
    /// [`StockxError::Config`] if the HTTP client cannot be built.
    pub fn from_config(config: &StockxConfig) -> Result<Self, StockxError> {
        let http = HttpClient::builder().timeout(config.api.request_timeout()).build()?;
        Ok(Self::new(http, config.api.auth_url.clone(), &config.credentials))
    }

    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }
}

/// Refusals (4xx) are permanent for these inputs; everything else may clear
/// up on a later attempt.
fn classify(error: StockxError) -> CredentialError {
    match error {
        StockxError::Auth(message) | StockxError::Remote { message, .. } => {
            CredentialError::Rejected { message }
        }
        other => CredentialError::Unavailable { message: other.to_string() },
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    #[instrument(skip_all, fields(auth_url = %self.auth_url))]
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, CredentialError> {
        let form = [
            ("grant_type", GRANT_TYPE),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("audience", self.audience.as_str()),
            ("refresh_token", refresh_token),
        ];
        let request = self.http.request(Method::POST, self.auth_url.as_str()).form(&form);

        debug!("exchanging refresh token");
        let response = self.http.send(request).await.map_err(classify)?;
        let response = error_for_status(response).await.map_err(classify)?;
        let token: TokenResponse = response.json().await.map_err(|err| {
            CredentialError::Unavailable { message: format!("malformed token response: {err}") }
        })?;

        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        info!(expires_in, rotated = token.refresh_token.is_some(), "access token refreshed");
        Ok(RefreshedToken {
            access_token: token.access_token,
            expires_in,
            refresh_token: token.refresh_token,
        })
    }
}

impl std::fmt::Debug for OAuthRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthRefresher")
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("audience", &self.audience)
            .finish()
    }
}
