//! Typed marketplace client
//!
//! Routes every [`RemoteApi`] method through the [`RequestExecutor`] and
//! decides which responses are cacheable: catalog products for the life of
//! the process, market data for a short window.

use std::sync::Arc;
use std::time::Duration;

use stockx_common::cache::TtlPolicy;
use stockx_domain::{
    CreateListingInput, ListingPage, ListingStatus, MarketData, Operation, OperationKind, Product,
    RemoteListing, Result, StockxError, UpdateListingInput,
};
use tracing::debug;

use crate::executor::{RequestExecutor, RequestSpec};
use crate::ports::{ListingQuery, RemoteApi};

/// Marketplace operations with credentials, throttling, retry and caching
/// applied.
#[derive(Clone)]
pub struct MarketplaceClient {
    executor: Arc<RequestExecutor>,
    api: Arc<dyn RemoteApi>,
    market_data_ttl: Duration,
}

impl MarketplaceClient {
    pub fn new(executor: Arc<RequestExecutor>, api: Arc<dyn RemoteApi>, market_data_ttl: Duration) -> Self {
        Self { executor, api, market_data_ttl }
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    pub async fn create_listing(&self, input: &CreateListingInput) -> Result<Operation> {
        let api = self.api.as_ref();
        self.executor
            .call(RequestSpec::new("create_listing"), move |token| async move {
                api.create_listing(&token, input).await
            })
            .await
    }

    pub async fn update_listing(&self, input: &UpdateListingInput) -> Result<Operation> {
        let api = self.api.as_ref();
        self.executor
            .call(RequestSpec::new("update_listing"), move |token| async move {
                api.update_listing(&token, input).await
            })
            .await
    }

    pub async fn delete_listing(&self, listing_id: &str) -> Result<Operation> {
        let api = self.api.as_ref();
        self.executor
            .call(RequestSpec::new("delete_listing"), move |token| async move {
                api.delete_listing(&token, listing_id).await
            })
            .await
    }

    pub async fn batch_create_listings(&self, inputs: &[CreateListingInput]) -> Result<Operation> {
        let api = self.api.as_ref();
        self.executor
            .call(RequestSpec::new("batch_create_listings"), move |token| async move {
                api.batch_create_listings(&token, inputs).await
            })
            .await
    }

    pub async fn batch_update_listings(&self, inputs: &[UpdateListingInput]) -> Result<Operation> {
        let api = self.api.as_ref();
        self.executor
            .call(RequestSpec::new("batch_update_listings"), move |token| async move {
                api.batch_update_listings(&token, inputs).await
            })
            .await
    }

    pub async fn batch_delete_listings(&self, listing_ids: &[String]) -> Result<Operation> {
        let api = self.api.as_ref();
        self.executor
            .call(RequestSpec::new("batch_delete_listings"), move |token| async move {
                api.batch_delete_listings(&token, listing_ids).await
            })
            .await
    }

    pub async fn operation_status(&self, kind: OperationKind, operation_id: &str) -> Result<Operation> {
        let api = self.api.as_ref();
        self.executor
            .call(RequestSpec::new("get_operation_status"), move |token| async move {
                api.get_operation_status(&token, kind, operation_id).await
            })
            .await
    }

    pub async fn listings_page(&self, query: &ListingQuery) -> Result<ListingPage> {
        let api = self.api.as_ref();
        self.executor
            .call(RequestSpec::new("get_listings"), move |token| async move {
                api.get_listings(&token, query).await
            })
            .await
    }

    /// Every listing in the given statuses, following pagination.
    pub async fn all_listings(
        &self,
        statuses: &[ListingStatus],
        page_size: u32,
    ) -> Result<Vec<RemoteListing>> {
        let mut query = ListingQuery::first_page(page_size, statuses.to_vec());
        let mut listings = Vec::new();
        loop {
            let page = self.listings_page(&query).await?;
            debug!(page = page.page_number, count = page.listings.len(), "fetched listings page");
            listings.extend(page.listings);
            if !page.has_next_page {
                return Ok(listings);
            }
            query = query.next_page();
        }
    }

    /// Market data for every variant of `product_id`, cached briefly.
    pub async fn market_data(&self, product_id: &str, currency: &str) -> Result<Vec<MarketData>> {
        let api = self.api.as_ref();
        let spec = RequestSpec::new("get_market_data").cached(
            format!("market-data:{product_id}:{currency}"),
            TtlPolicy::TimeBound(self.market_data_ttl),
        );
        self.executor
            .call(spec, move |token| async move {
                api.get_market_data(&token, product_id, currency).await
            })
            .await
    }

    /// Market data for one variant.
    ///
    /// # Errors
    /// `Remote` 404 when the product has no data for the variant.
    pub async fn variant_market_data(
        &self,
        product_id: &str,
        variant_id: &str,
        currency: &str,
    ) -> Result<MarketData> {
        self.market_data(product_id, currency)
            .await?
            .into_iter()
            .find(|data| data.variant_id == variant_id)
            .ok_or_else(|| StockxError::Remote {
                status: 404,
                message: format!("no market data for variant {variant_id} of {product_id}"),
            })
    }

    /// Catalog product, cached for the life of the process.
    pub async fn product(&self, product_id: &str) -> Result<Product> {
        let api = self.api.as_ref();
        let spec = RequestSpec::new("get_product")
            .cached(format!("product:{product_id}"), TtlPolicy::Invariant);
        self.executor
            .call(spec, move |token| async move { api.get_product(&token, product_id).await })
            .await
    }
}

impl std::fmt::Debug for MarketplaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceClient")
            .field("executor", &self.executor)
            .field("market_data_ttl", &self.market_data_ttl)
            .finish_non_exhaustive()
    }
}
