//! Wiring of the HTTP adapters into the engine

use std::sync::Arc;

use stockx_core::{InventorySession, MarketplaceClient, RequestExecutor};
use stockx_domain::{Result, StockxConfig};
use tracing::info;

use crate::api::{OAuthRefresher, StockxApiClient};

/// Build a [`MarketplaceClient`] talking to the real API.
///
/// # Errors
/// [`stockx_domain::StockxError::Config`] when the configuration is invalid.
pub fn marketplace_client(config: &StockxConfig) -> Result<MarketplaceClient> {
    config.validate()?;

    let refresher = OAuthRefresher::from_config(config)?;
    let executor = RequestExecutor::from_config(config, Arc::new(refresher))?;
    let api = StockxApiClient::from_config(config)?;

    info!(base_url = %config.api.base_url, "marketplace client ready");
    Ok(MarketplaceClient::new(Arc::new(executor), Arc::new(api), config.cache.market_data_ttl()))
}

/// Build a client and open an inventory session over the seller's active
/// listings.
///
/// # Errors
/// Configuration errors, or the first failure while fetching listings.
pub async fn open_session(config: &StockxConfig) -> Result<InventorySession> {
    let client = marketplace_client(config)?;
    InventorySession::open(client, config).await
}
