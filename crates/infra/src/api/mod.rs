//! Marketplace REST adapter
//!
//! [`StockxApiClient`] implements the engine's `RemoteApi` port over HTTP and
//! [`OAuthRefresher`] implements the token refresh port. Neither retries or
//! caches: the request executor in `stockx-core` owns those concerns.

pub mod auth;
pub mod client;
pub mod wire;

pub use auth::OAuthRefresher;
pub use client::StockxApiClient;
