//! reqwest implementation of the marketplace port
//!
//! One HTTP call per [`RemoteApi`] method (two for a finished batch, whose
//! entries live on a separate endpoint). Credentials, throttling, retries
//! and caching are applied by the request executor around these calls.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use stockx_core::{ListingQuery, RemoteApi};
use stockx_domain::constants::API_KEY_HEADER;
use stockx_domain::{
    CreateListingInput, ListingPage, MarketData, Operation, OperationInput, OperationKind, Product,
    Result, StockxConfig, StockxError, UpdateListingInput,
};
use tracing::{debug, instrument};
use url::Url;

use super::wire::{
    batch_operation, BatchBody, BatchItemsDto, BatchStatusDto, CreateListingBody,
    DeleteListingBody, ListingOperationDto, ListingsPageDto, MarketDataDto, ProductDto,
    UpdateListingBody,
};
use crate::errors::InfraError;
use crate::http::HttpClient;

/// HTTP adapter for the marketplace REST API
#[derive(Clone)]
pub struct StockxApiClient {
    http: HttpClient,
    base_url: Url,
    /// Currency assumed for batch echoes that omit one
    default_currency: String,
}

impl StockxApiClient {
    /// Build the adapter from configuration. The API key is sent as a
    /// default header on every request.
    ///
    /// # Errors
    /// [`StockxError::Config`] for an invalid base URL or API key.
    pub fn from_config(config: &StockxConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.credentials.api_key)
            .map_err(|_| StockxError::Config("credentials.api_key is not a valid header".into()))?;
        headers.insert(API_KEY_HEADER, api_key);

        let http = HttpClient::builder()
            .timeout(config.api.request_timeout())
            .default_headers(headers)
            .build()?;

        Self::new(http, &config.api.base_url, &config.inventory.currency)
    }

    /// # Errors
    /// [`StockxError::Config`] when `base_url` does not parse.
    pub fn new(http: HttpClient, base_url: &str, default_currency: &str) -> Result<Self> {
        // A trailing slash makes `Url::join` append rather than replace the
        // last path segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalized).map_err(|err| StockxError::from(InfraError::from(err)))?;
        Ok(Self { http, base_url, default_currency: default_currency.to_string() })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| InfraError::from(err).into())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let request =
            self.http.request(Method::GET, self.url(path)?).bearer_auth(token).query(query);
        self.http.send_json(request).await
    }

    async fn send_body<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        token: &str,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.http.request(method, self.url(path)?).bearer_auth(token).json(body);
        self.http.send_json(request).await
    }

    /// Submit a batch. The returned operation is always pending, even if the
    /// batch finished instantly: entry outcomes are only known from polling.
    async fn submit_batch<B: Serialize + Send + Sync>(
        &self,
        token: &str,
        kind: OperationKind,
        items: Vec<B>,
    ) -> Result<Operation> {
        let path = format!("/batch/{}", kind.batch_path());
        let status: BatchStatusDto =
            self.send_body(Method::POST, token, &path, &BatchBody { items }).await?;
        debug!(batch_id = %status.batch_id, ?kind, "batch submitted");
        Ok(Operation::pending(status.batch_id, kind))
    }
}

#[async_trait]
impl RemoteApi for StockxApiClient {
    #[instrument(skip(self, token, input), fields(variant_id = %input.variant_id))]
    async fn create_listing(&self, token: &str, input: &CreateListingInput) -> Result<Operation> {
        let dto: ListingOperationDto = self
            .send_body(Method::POST, token, "/selling/listings", &CreateListingBody::from(input))
            .await?;
        dto.into_domain(OperationKind::Create, OperationInput::from(input))
    }

    #[instrument(skip(self, token, input), fields(listing_id = %input.listing_id))]
    async fn update_listing(&self, token: &str, input: &UpdateListingInput) -> Result<Operation> {
        let path = format!("/selling/listings/{}", input.listing_id);
        let dto: ListingOperationDto =
            self.send_body(Method::PATCH, token, &path, &UpdateListingBody::single(input)).await?;
        dto.into_domain(OperationKind::Update, OperationInput::from(input))
    }

    #[instrument(skip(self, token))]
    async fn delete_listing(&self, token: &str, listing_id: &str) -> Result<Operation> {
        let path = format!("/selling/listings/{listing_id}");
        let request = self.http.request(Method::DELETE, self.url(&path)?).bearer_auth(token);
        let dto: ListingOperationDto = self.http.send_json(request).await?;
        dto.into_domain(
            OperationKind::Delete,
            OperationInput::Delete { listing_id: listing_id.to_string() },
        )
    }

    #[instrument(skip_all, fields(entries = inputs.len()))]
    async fn batch_create_listings(
        &self,
        token: &str,
        inputs: &[CreateListingInput],
    ) -> Result<Operation> {
        let items = inputs.iter().map(CreateListingBody::from).collect();
        self.submit_batch(token, OperationKind::Create, items).await
    }

    #[instrument(skip_all, fields(entries = inputs.len()))]
    async fn batch_update_listings(
        &self,
        token: &str,
        inputs: &[UpdateListingInput],
    ) -> Result<Operation> {
        let items = inputs.iter().map(UpdateListingBody::batch).collect();
        self.submit_batch(token, OperationKind::Update, items).await
    }

    #[instrument(skip_all, fields(entries = listing_ids.len()))]
    async fn batch_delete_listings(&self, token: &str, listing_ids: &[String]) -> Result<Operation> {
        let items = listing_ids
            .iter()
            .map(|listing_id| DeleteListingBody { listing_id: listing_id.clone() })
            .collect();
        self.submit_batch(token, OperationKind::Delete, items).await
    }

    #[instrument(skip(self, token))]
    async fn get_operation_status(
        &self,
        token: &str,
        kind: OperationKind,
        operation_id: &str,
    ) -> Result<Operation> {
        let path = format!("/batch/{}/{operation_id}", kind.batch_path());
        let status: BatchStatusDto = self.get(token, &path, &[]).await?;
        let items = if status.is_finished() {
            let items: BatchItemsDto = self.get(token, &format!("{path}/items"), &[]).await?;
            Some(items)
        } else {
            None
        };
        batch_operation(kind, status, items, &self.default_currency)
    }

    #[instrument(skip(self, token))]
    async fn get_listings(&self, token: &str, query: &ListingQuery) -> Result<ListingPage> {
        let mut params = vec![
            ("pageNumber", query.page_number.to_string()),
            ("pageSize", query.page_size.to_string()),
        ];
        if !query.statuses.is_empty() {
            let statuses: Vec<_> = query.statuses.iter().map(|s| s.as_wire_str()).collect();
            params.push(("listingStatuses", statuses.join(",")));
        }
        let page: ListingsPageDto = self.get(token, "/selling/listings", &params).await?;
        page.into_domain()
    }

    #[instrument(skip(self, token))]
    async fn get_market_data(
        &self,
        token: &str,
        product_id: &str,
        currency: &str,
    ) -> Result<Vec<MarketData>> {
        let path = format!("/catalog/products/{product_id}/market-data");
        let data: Vec<MarketDataDto> =
            self.get(token, &path, &[("currencyCode", currency.to_string())]).await?;
        Ok(data.into_iter().map(MarketData::from).collect())
    }

    #[instrument(skip(self, token))]
    async fn get_product(&self, token: &str, product_id: &str) -> Result<Product> {
        let path = format!("/catalog/products/{product_id}");
        let product: ProductDto = self.get(token, &path, &[]).await?;
        Ok(product.into())
    }
}

impl std::fmt::Debug for StockxApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockxApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("default_currency", &self.default_currency)
            .finish_non_exhaustive()
    }
}
