//! In-memory marketplace used by the integration tests.
//!
//! `FakeRemoteApi` keeps a listing table, answers batch submissions with
//! pending operations that become terminal after a configurable number of
//! polls, and records every call so tests can assert on traffic.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use stockx_common::auth::{CredentialError, RefreshedToken, TokenRefresher};
use stockx_core::{ListingQuery, MarketplaceClient, RemoteApi, RequestExecutor};
use stockx_domain::{
    CreateListingInput, ListingPage, ListingStatus, MarketData, Operation, OperationInput,
    OperationItem, OperationItemStatus, OperationKind, OperationStatus, Product, RemoteListing,
    Result, StockxConfig, StockxError, UpdateListingInput,
};

/// Hands out `token-1`, `token-2`, ... one per refresh.
#[derive(Debug, Default)]
pub struct CountingRefresher {
    calls: AtomicU32,
}

impl CountingRefresher {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self, _refresh_token: &str) -> std::result::Result<RefreshedToken, CredentialError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RefreshedToken { access_token: format!("token-{n}"), expires_in: 3600, refresh_token: None })
    }
}

/// Submitted batch as seen by the fake
#[derive(Debug, Clone)]
pub struct BatchCall {
    pub kind: OperationKind,
    pub inputs: Vec<OperationInput>,
}

#[derive(Debug, Default)]
struct FakeState {
    listings: Vec<RemoteListing>,
    market: HashMap<String, Vec<MarketData>>,
    products: HashMap<String, Product>,
    pending: HashMap<String, (u32, Operation)>,
    batches: Vec<BatchCall>,
    calls: HashMap<&'static str, u32>,
    tokens: Vec<String>,
    rejected_tokens: HashSet<String>,
    failing_listings: HashMap<String, String>,
    kind_errors: HashMap<OperationKind, StockxError>,
    scripted_errors: VecDeque<StockxError>,
    polls_to_finish: u32,
    never_finish: bool,
    omit_entries: bool,
    next_id: u32,
}

#[derive(Debug, Default)]
pub struct FakeRemoteApi {
    state: Mutex<FakeState>,
}

impl FakeRemoteApi {
    pub fn new(listings: Vec<RemoteListing>) -> Self {
        let api = Self::default();
        api.state.lock().listings = listings;
        api.state.lock().polls_to_finish = 1;
        api
    }

    /// Batch entries targeting `listing_id` complete as FAILED with `error`.
    pub fn fail_listing(&self, listing_id: &str, error: &str) {
        self.state.lock().failing_listings.insert(listing_id.into(), error.into());
    }

    /// Submissions of `kind` fail with `error`.
    pub fn fail_kind(&self, kind: OperationKind, error: StockxError) {
        self.state.lock().kind_errors.insert(kind, error);
    }

    /// The next calls, of any method, fail with these errors in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = StockxError>) {
        self.state.lock().scripted_errors.extend(errors);
    }

    /// Requests carrying `token` are answered with 401.
    pub fn reject_token(&self, token: &str) {
        self.state.lock().rejected_tokens.insert(token.into());
    }

    pub fn set_polls_to_finish(&self, polls: u32) {
        self.state.lock().polls_to_finish = polls;
    }

    /// Operations stay PENDING forever.
    pub fn never_finish(&self) {
        self.state.lock().never_finish = true;
    }

    /// Finished operations report their status without per-entry results.
    pub fn omit_entries(&self) {
        self.state.lock().omit_entries = true;
    }

    pub fn set_market_data(&self, product_id: &str, data: Vec<MarketData>) {
        self.state.lock().market.insert(product_id.into(), data);
    }

    pub fn add_product(&self, product: Product) {
        self.state.lock().products.insert(product.product_id.clone(), product);
    }

    pub fn calls(&self, method: &str) -> u32 {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    pub fn batches(&self) -> Vec<BatchCall> {
        self.state.lock().batches.clone()
    }

    pub fn batches_of(&self, kind: OperationKind) -> Vec<BatchCall> {
        self.batches().into_iter().filter(|b| b.kind == kind).collect()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().tokens.clone()
    }

    pub fn listings(&self) -> Vec<RemoteListing> {
        self.state.lock().listings.clone()
    }

    fn enter(&self, method: &'static str, token: &str) -> Result<()> {
        let mut state = self.state.lock();
        *state.calls.entry(method).or_default() += 1;
        state.tokens.push(token.to_string());
        if state.rejected_tokens.contains(token) {
            return Err(StockxError::from_status(401, "token expired"));
        }
        match state.scripted_errors.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn submit(&self, kind: OperationKind, inputs: Vec<OperationInput>) -> Result<Operation> {
        let mut state = self.state.lock();
        if let Some(error) = state.kind_errors.get(&kind) {
            return Err(error.clone());
        }
        state.batches.push(BatchCall { kind, inputs: inputs.clone() });
        state.next_id += 1;
        let operation_id = format!("op-{}", state.next_id);

        let mut items = Vec::new();
        for input in inputs {
            let failure = input.listing_id().and_then(|id| state.failing_listings.get(id).cloned());
            let item = match failure {
                Some(error) => OperationItem {
                    input,
                    status: OperationItemStatus::Failed,
                    listing_id: None,
                    error: Some(error),
                },
                None => {
                    let listing_id = apply(&mut state, &input);
                    OperationItem { input, status: OperationItemStatus::Completed, listing_id, error: None }
                }
            };
            items.push(item);
        }

        let failed = items.iter().filter(|i| i.is_failed()).count();
        let terminal = Operation {
            operation_id: operation_id.clone(),
            kind,
            status: if failed == 0 { OperationStatus::Succeeded } else { OperationStatus::Failed },
            error: (failed > 0).then(|| format!("{failed} entries failed")),
            items: if state.omit_entries { Vec::new() } else { items },
        };
        let polls = state.polls_to_finish;
        state.pending.insert(operation_id.clone(), (polls, terminal));
        Ok(Operation::pending(operation_id, kind))
    }
}

fn apply(state: &mut FakeState, input: &OperationInput) -> Option<String> {
    match input {
        OperationInput::Create { variant_id, amount, currency } => {
            state.next_id += 1;
            let listing_id = format!("new-{}", state.next_id);
            state.listings.push(listing(&listing_id, variant_id, *amount).with_currency(currency));
            Some(listing_id)
        }
        OperationInput::Update { listing_id, amount } => {
            if let Some(listing) = state.listings.iter_mut().find(|l| &l.listing_id == listing_id) {
                listing.amount = *amount;
            }
            Some(listing_id.clone())
        }
        OperationInput::Delete { listing_id } => {
            state.listings.retain(|l| &l.listing_id != listing_id);
            Some(listing_id.clone())
        }
    }
}

#[async_trait]
impl RemoteApi for FakeRemoteApi {
    async fn create_listing(&self, token: &str, input: &CreateListingInput) -> Result<Operation> {
        self.enter("create_listing", token)?;
        self.submit(OperationKind::Create, vec![input.into()])
    }

    async fn update_listing(&self, token: &str, input: &UpdateListingInput) -> Result<Operation> {
        self.enter("update_listing", token)?;
        self.submit(OperationKind::Update, vec![input.into()])
    }

    async fn delete_listing(&self, token: &str, listing_id: &str) -> Result<Operation> {
        self.enter("delete_listing", token)?;
        self.submit(OperationKind::Delete, vec![OperationInput::Delete { listing_id: listing_id.into() }])
    }

    async fn batch_create_listings(&self, token: &str, inputs: &[CreateListingInput]) -> Result<Operation> {
        self.enter("batch_create_listings", token)?;
        self.submit(OperationKind::Create, inputs.iter().map(OperationInput::from).collect())
    }

    async fn batch_update_listings(&self, token: &str, inputs: &[UpdateListingInput]) -> Result<Operation> {
        self.enter("batch_update_listings", token)?;
        self.submit(OperationKind::Update, inputs.iter().map(OperationInput::from).collect())
    }

    async fn batch_delete_listings(&self, token: &str, listing_ids: &[String]) -> Result<Operation> {
        self.enter("batch_delete_listings", token)?;
        self.submit(
            OperationKind::Delete,
            listing_ids.iter().map(|id| OperationInput::Delete { listing_id: id.clone() }).collect(),
        )
    }

    async fn get_operation_status(
        &self,
        token: &str,
        kind: OperationKind,
        operation_id: &str,
    ) -> Result<Operation> {
        self.enter("get_operation_status", token)?;
        let mut state = self.state.lock();
        let never_finish = state.never_finish;
        let Some((remaining, terminal)) = state.pending.get_mut(operation_id) else {
            return Err(StockxError::from_status(404, format!("no operation {operation_id}")));
        };
        if never_finish || *remaining > 1 {
            *remaining = remaining.saturating_sub(1);
            return Ok(Operation::pending(operation_id, kind));
        }
        Ok(terminal.clone())
    }

    async fn get_listings(&self, token: &str, query: &ListingQuery) -> Result<ListingPage> {
        self.enter("get_listings", token)?;
        let state = self.state.lock();
        let matching: Vec<_> = state
            .listings
            .iter()
            .filter(|l| query.statuses.is_empty() || query.statuses.contains(&l.status))
            .cloned()
            .collect();
        let size = query.page_size as usize;
        let start = (query.page_number as usize - 1) * size;
        let listings: Vec<_> = matching.iter().skip(start).take(size).cloned().collect();
        Ok(ListingPage {
            has_next_page: start + listings.len() < matching.len(),
            listings,
            page_number: query.page_number,
        })
    }

    async fn get_market_data(&self, token: &str, product_id: &str, _currency: &str) -> Result<Vec<MarketData>> {
        self.enter("get_market_data", token)?;
        Ok(self.state.lock().market.get(product_id).cloned().unwrap_or_default())
    }

    async fn get_product(&self, token: &str, product_id: &str) -> Result<Product> {
        self.enter("get_product", token)?;
        self.state
            .lock()
            .products
            .get(product_id)
            .cloned()
            .ok_or_else(|| StockxError::from_status(404, format!("no product {product_id}")))
    }
}

pub trait ListingExt {
    fn with_currency(self, currency: &str) -> Self;
    fn created(self, rfc3339: &str) -> Self;
}

impl ListingExt for RemoteListing {
    fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.into();
        self
    }

    fn created(mut self, rfc3339: &str) -> Self {
        self.created_at = chrono::DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc));
        self
    }
}

pub fn listing(listing_id: &str, variant_id: &str, amount: f64) -> RemoteListing {
    RemoteListing {
        listing_id: listing_id.into(),
        variant_id: variant_id.into(),
        product_id: "prod-1".into(),
        amount,
        currency: "USD".into(),
        quantity: 1,
        status: ListingStatus::Active,
        style_id: Some("DD1391-100".into()),
        product_name: Some("Dunk Low Panda".into()),
        variant_value: Some("10".into()),
        created_at: None,
    }
}

/// Configuration with short retry delays and small batches.
pub fn config() -> StockxConfig {
    let mut config = StockxConfig::default();
    config.credentials.api_key = "key".into();
    config.credentials.client_id = "client".into();
    config.credentials.client_secret = "secret".into();
    config.credentials.refresh_token = "refresh".into();
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 100;
    config
}

pub struct Harness {
    pub api: Arc<FakeRemoteApi>,
    pub refresher: Arc<CountingRefresher>,
    pub client: MarketplaceClient,
    pub config: StockxConfig,
}

pub fn harness(listings: Vec<RemoteListing>) -> Harness {
    harness_with(listings, config())
}

pub fn harness_with(listings: Vec<RemoteListing>, config: StockxConfig) -> Harness {
    let api = Arc::new(FakeRemoteApi::new(listings));
    let refresher = Arc::new(CountingRefresher::default());
    let executor = RequestExecutor::from_config(&config, refresher.clone()).unwrap();
    let client =
        MarketplaceClient::new(Arc::new(executor), api.clone(), config.cache.market_data_ttl());
    Harness { api, refresher, client, config }
}
