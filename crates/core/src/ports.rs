//! Port interface for the marketplace API
//!
//! The engine never speaks HTTP itself. Every remote call goes through a
//! [`RemoteApi`] implementation, wrapped by the request executor for
//! credentials, throttling, retry and caching.

use async_trait::async_trait;
use stockx_domain::{
    CreateListingInput, ListingPage, ListingStatus, MarketData, Operation, OperationKind, Product,
    Result, UpdateListingInput,
};

/// Page request for the seller's listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// 1-based page number
    pub page_number: u32,
    pub page_size: u32,
    /// Empty means every status
    pub statuses: Vec<ListingStatus>,
}

impl ListingQuery {
    pub fn first_page(page_size: u32, statuses: Vec<ListingStatus>) -> Self {
        Self { page_number: 1, page_size, statuses }
    }

    #[must_use]
    pub fn next_page(&self) -> Self {
        Self { page_number: self.page_number + 1, ..self.clone() }
    }
}

/// Typed transport for the marketplace. Every method takes the bearer
/// token to send.
///
/// Implementations map HTTP failures onto [`stockx_domain::StockxError`]
/// (`from_status` for error responses, `Network` for transport failures,
/// `Decode` for malformed bodies) and perform no retries of their own.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn create_listing(&self, token: &str, input: &CreateListingInput) -> Result<Operation>;

    async fn update_listing(&self, token: &str, input: &UpdateListingInput) -> Result<Operation>;

    async fn delete_listing(&self, token: &str, listing_id: &str) -> Result<Operation>;

    async fn batch_create_listings(
        &self,
        token: &str,
        inputs: &[CreateListingInput],
    ) -> Result<Operation>;

    async fn batch_update_listings(
        &self,
        token: &str,
        inputs: &[UpdateListingInput],
    ) -> Result<Operation>;

    async fn batch_delete_listings(&self, token: &str, listing_ids: &[String]) -> Result<Operation>;

    /// Current state of a batch operation. Terminal operations carry their
    /// per-entry outcomes.
    async fn get_operation_status(
        &self,
        token: &str,
        kind: OperationKind,
        operation_id: &str,
    ) -> Result<Operation>;

    async fn get_listings(&self, token: &str, query: &ListingQuery) -> Result<ListingPage>;

    /// Market data for every variant of a product
    async fn get_market_data(
        &self,
        token: &str,
        product_id: &str,
        currency: &str,
    ) -> Result<Vec<MarketData>>;

    async fn get_product(&self, token: &str, product_id: &str) -> Result<Product>;
}
