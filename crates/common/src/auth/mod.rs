//! Credential lifecycle for the marketplace API
//!
//! The API authenticates with a short-lived bearer token obtained by
//! exchanging a long-lived refresh token. [`CredentialManager`] owns that
//! exchange and guarantees a single refresh in flight no matter how many
//! requests need a token at once.
//!
//! ```text
//! request ──► CredentialManager ──► TokenRefresher (port)
//!                 │                      │
//!                 └── cached Credential  └── OAuth token endpoint (infra)
//! ```

pub mod credential_manager;
pub mod traits;
pub mod types;

pub use credential_manager::{CredentialManager, CredentialManagerConfig};
pub use traits::TokenRefresher;
pub use types::{Credential, CredentialError, CredentialPhase, RefreshedToken};
