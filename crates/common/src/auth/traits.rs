//! Port for the token endpoint
//!
//! Abstracting the refresh call keeps the credential lifecycle testable
//! without an OAuth server.

use async_trait::async_trait;

use super::types::{CredentialError, RefreshedToken};

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Perform one refresh call.
    ///
    /// # Errors
    /// [`CredentialError::Rejected`] when the provider refuses the refresh
    /// token or client, [`CredentialError::Unavailable`] for transport and
    /// server failures.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, CredentialError>;
}
