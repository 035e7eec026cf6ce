//! Scoped inventory session
//!
//! A session loads the seller's active listings once, lets callers stage
//! price and quantity edits, and applies them on [`InventorySession::flush`],
//! [`InventorySession::close`] or at the end of [`InventorySession::scope`].
//! Sessions dropped with pending edits flush them in the background on the
//! current runtime.

use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use stockx_domain::{
    Item, ItemKey, ItemMarketData, ListingStatus, RemoteListing, Result, StockxConfig, StockxError,
};
use tokio::runtime::Handle;
use tracing::{error, info, instrument, warn};

use super::change_set::ChangeSet;
use super::index::InventoryIndex;
use super::query::ItemQuery;
use super::reconciler::BatchReconciler;
use super::results::FlushReport;
use crate::client::MarketplaceClient;

/// What a scoped closure returned, together with the flush that followed it
#[derive(Debug)]
pub struct ScopeOutcome<T> {
    pub value: Result<T>,
    pub report: FlushReport,
}

impl<T> ScopeOutcome<T> {
    /// The closure's value if both it and the flush succeeded.
    ///
    /// # Errors
    /// The closure's error first; otherwise the first failed item's error.
    pub fn into_result(self) -> Result<T> {
        let value = self.value?;
        match self.report.failed().chain(self.report.not_attempted()).find_map(|r| r.error.clone()) {
            Some(failure) => Err(failure.into_stockx_error()),
            None => Ok(value),
        }
    }
}

pub struct InventorySession {
    client: MarketplaceClient,
    reconciler: BatchReconciler,
    index: InventoryIndex,
    changes: ChangeSet,
    currency: String,
    page_size: u32,
    parallelism: usize,
    closed: bool,
}

impl InventorySession {
    /// Load every active listing and build the session's index.
    #[instrument(skip_all)]
    pub async fn open(client: MarketplaceClient, config: &StockxConfig) -> Result<Self> {
        let listings =
            client.all_listings(&[ListingStatus::Active], config.inventory.page_size).await?;
        info!(listings = listings.len(), "inventory loaded");
        Ok(Self::from_listings(client, listings, config))
    }

    /// Build a session over listings the caller already holds.
    pub fn from_listings(
        client: MarketplaceClient,
        listings: impl IntoIterator<Item = RemoteListing>,
        config: &StockxConfig,
    ) -> Self {
        let index = InventoryIndex::build(listings, config.fees);
        let reconciler = BatchReconciler::new(client.clone(), config.batch.clone());
        Self {
            client,
            reconciler,
            index,
            changes: ChangeSet::new(),
            currency: config.inventory.currency.clone(),
            page_size: config.inventory.page_size,
            parallelism: config.batch.max_parallel.max(1),
            closed: false,
        }
    }

    pub fn client(&self) -> &MarketplaceClient {
        &self.client
    }

    pub fn index(&self) -> &InventoryIndex {
        &self.index
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Items as they will look after the next flush.
    ///
    /// Keys stay those of the loaded listings; price, quantity and payout
    /// reflect pending edits.
    pub fn items(&self) -> Vec<Item> {
        self.index.snapshot().into_iter().map(|item| self.with_pending(item)).collect()
    }

    pub fn item(&self, key: &ItemKey) -> Option<Item> {
        self.index.get(key).cloned().map(|item| self.with_pending(item))
    }

    fn with_pending(&self, mut item: Item) -> Item {
        if let Some(change) = self.changes.get(&item.key) {
            if let Some(price) = change.desired_price {
                item.price = price;
                item.payout = self.index.fees().payout(price);
            }
            if let Some(quantity) = change.desired_quantity {
                item.quantity = quantity;
            }
        }
        item
    }

    /// Stage a new price for every listing of an item.
    ///
    /// # Errors
    /// `InvalidInput` for unknown items and invalid prices.
    pub fn set_price(&self, key: &ItemKey, price: f64) -> Result<()> {
        self.known(key)?;
        self.changes.record_price_change(key, price)
    }

    /// Stage a new absolute quantity for an item.
    ///
    /// # Errors
    /// `InvalidInput` for unknown items and negative quantities.
    pub fn set_quantity(&self, key: &ItemKey, quantity: i64) -> Result<()> {
        self.known(key)?;
        self.changes.record_quantity_change(key, quantity)
    }

    /// Stage `quantity` new listings of a variant at `price`.
    ///
    /// If the session already holds that item the quantity is added to it.
    pub fn sell(&self, variant_id: &str, price: f64, quantity: u32) -> Result<ItemKey> {
        if !price.is_finite() || price <= 0.0 {
            return Err(StockxError::InvalidInput(format!("invalid price {price} for {variant_id}")));
        }
        let key = ItemKey::new(variant_id, price, self.currency.clone());
        let current = self
            .changes
            .get(&key)
            .and_then(|change| change.desired_quantity)
            .or_else(|| self.index.get(&key).map(|item| item.quantity))
            .unwrap_or(0);
        self.changes.record_quantity_change(&key, i64::from(current) + i64::from(quantity))?;
        Ok(key)
    }

    /// Drop any staged edit for `key`.
    pub fn discard(&self, key: &ItemKey) -> bool {
        self.changes.discard(key).is_some()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }

    fn known(&self, key: &ItemKey) -> Result<()> {
        match self.index.get(key) {
            Some(_) => Ok(()),
            None => Err(StockxError::InvalidInput(format!("no item {key} in this session"))),
        }
    }

    /// Query over [`InventorySession::items`].
    pub fn query(&self) -> ItemQuery {
        ItemQuery::new(self.items()).buffered(self.parallelism)
    }

    /// Current market data for an item, with payouts.
    pub async fn market_data(&self, item: &Item) -> Result<ItemMarketData> {
        let data =
            self.client.variant_market_data(&item.product_id, item.variant_id(), &item.currency).await?;
        Ok(ItemMarketData::from_market(&data, self.index.fees()))
    }

    pub(crate) fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Apply staged edits.
    ///
    /// The index is not rebuilt; call [`InventorySession::refresh`] (or use
    /// [`InventorySession::commit`]) to see the new listings.
    pub async fn flush(&self) -> FlushReport {
        self.reconciler.flush(&self.changes, &self.index).await
    }

    /// Flush, then reload the index.
    pub async fn commit(&mut self) -> Result<FlushReport> {
        let report = self.flush().await;
        self.refresh().await?;
        Ok(report)
    }

    /// Rebuild the index from the marketplace. Staged edits are kept.
    #[instrument(skip_all)]
    pub async fn refresh(&mut self) -> Result<()> {
        let listings = self.client.all_listings(&[ListingStatus::Active], self.page_size).await?;
        self.index = InventoryIndex::build(listings, *self.index.fees());
        info!(items = self.index.len(), "inventory refreshed");
        Ok(())
    }

    /// Flush and end the session.
    pub async fn close(mut self) -> FlushReport {
        let report = self.flush().await;
        self.closed = true;
        report
    }

    /// Run `f` against the session, then flush on every exit path.
    ///
    /// A panic inside `f` is resumed after the flush completes.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let outcome = session
    ///     .scope(|session| {
    ///         Box::pin(async move {
    ///             for item in session.query().filter_fn(|i| i.price > 200.0).all().await? {
    ///                 session.set_price(&item.key, item.price - 5.0)?;
    ///             }
    ///             Ok(())
    ///         })
    ///     })
    ///     .await;
    /// ```
    pub async fn scope<T, F>(self, f: F) -> ScopeOutcome<T>
    where
        F: for<'a> FnOnce(&'a InventorySession) -> BoxFuture<'a, Result<T>>,
    {
        let outcome = AssertUnwindSafe(f(&self)).catch_unwind().await;
        let report = self.close().await;
        if !report.is_success() {
            warn!(failed = report.failed().count(), "scope flush had failures");
        }
        match outcome {
            Ok(value) => ScopeOutcome { value, report },
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Drop for InventorySession {
    fn drop(&mut self) {
        if self.closed || self.changes.is_empty() {
            return;
        }
        warn!(pending = self.changes.len(), "inventory session dropped with unflushed changes");

        let Ok(handle) = Handle::try_current() else {
            error!(pending = self.changes.len(), "no runtime to flush on; changes discarded");
            return;
        };
        let changes = ChangeSet::from(self.changes.drain());
        let index = self.index.clone();
        let reconciler = self.reconciler.clone();
        handle.spawn(async move {
            let report = reconciler.flush(&changes, &index).await;
            if !report.is_success() {
                warn!(failed = report.failed().count(), "background flush had failures");
            }
        });
    }
}

impl std::fmt::Debug for InventorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventorySession")
            .field("items", &self.index.len())
            .field("pending", &self.changes.len())
            .field("currency", &self.currency)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
