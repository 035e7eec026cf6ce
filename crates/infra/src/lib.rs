//! # StockX Infrastructure
//!
//! Infrastructure implementations of core engine ports.
//!
//! This crate contains:
//! - The reqwest-based marketplace client and OAuth token refresher
//! - Configuration loading from environment variables and files
//! - Logging bootstrap
//!
//! ## Architecture
//! - Implements traits defined in `stockx-core` and `stockx-common`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{OAuthRefresher, StockxApiClient};
pub use bootstrap::{marketplace_client, open_session};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::init_logging;
