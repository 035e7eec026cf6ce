//! Predicate-based inventory queries
//!
//! A query is a conjunction of [`Rule`]s evaluated against a snapshot of
//! items. Rules may be synchronous closures or async checks (for example
//! ones that consult market data); async rules run with bounded
//! concurrency and results keep the snapshot's order.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use stockx_domain::{Item, Result};

/// A predicate over `T`.
#[async_trait]
pub trait Rule<T: Sync + ?Sized>: Send + Sync {
    async fn evaluate(&self, subject: &T) -> Result<bool>;
}

/// Rule backed by a plain closure.
pub struct SyncRule<F> {
    predicate: F,
}

impl<F> SyncRule<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<T, F> Rule<T> for SyncRule<F>
where
    T: Sync + ?Sized,
    F: Fn(&T) -> bool + Send + Sync,
{
    async fn evaluate(&self, subject: &T) -> Result<bool> {
        Ok((self.predicate)(subject))
    }
}

/// Rule backed by an async closure that receives an owned copy of the
/// subject.
pub struct AsyncRule<T, F> {
    check: F,
    _subject: PhantomData<fn(T)>,
}

impl<T, F> AsyncRule<T, F> {
    pub fn new(check: F) -> Self {
        Self { check, _subject: PhantomData }
    }
}

#[async_trait]
impl<T, F, Fut> Rule<T> for AsyncRule<T, F>
where
    T: Clone + Send + Sync,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send,
{
    async fn evaluate(&self, subject: &T) -> Result<bool> {
        (self.check)(subject.clone()).await
    }
}

/// Declarative item filter. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub product_ids: Vec<String>,
    pub variant_ids: Vec<String>,
    /// A style id matches if any of the item's `/`-separated style ids equals it
    pub style_ids: Vec<String>,
    pub sizes: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_ids.push(product_id.into());
        self
    }

    pub fn variant_id(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_ids.push(variant_id.into());
        self
    }

    pub fn style_id(mut self, style_id: impl Into<String>) -> Self {
        self.style_ids.push(style_id.into());
        self
    }

    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.sizes.push(size.into());
        self
    }

    pub fn price_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        let in_list = |list: &[String], value: &str| list.is_empty() || list.iter().any(|v| v == value);

        let style_matches = self.style_ids.is_empty()
            || item.style_id.as_deref().is_some_and(|styles| {
                styles.split('/').map(str::trim).any(|style| self.style_ids.iter().any(|s| s == style))
            });
        let size_matches = self.sizes.is_empty()
            || item.size.as_deref().is_some_and(|size| self.sizes.iter().any(|s| s == size));

        in_list(&self.product_ids, &item.product_id)
            && in_list(&self.variant_ids, item.variant_id())
            && style_matches
            && size_matches
            && self.min_price.map_or(true, |min| item.price >= min)
            && self.max_price.map_or(true, |max| item.price <= max)
    }
}

#[async_trait]
impl Rule<Item> for FilterCriteria {
    async fn evaluate(&self, subject: &Item) -> Result<bool> {
        Ok(self.matches(subject))
    }
}

const DEFAULT_RULE_CONCURRENCY: usize = 8;

/// Lazily evaluated query over an item snapshot.
pub struct ItemQuery {
    items: Vec<Item>,
    rules: Vec<Arc<dyn Rule<Item>>>,
    concurrency: usize,
}

impl ItemQuery {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items, rules: Vec::new(), concurrency: DEFAULT_RULE_CONCURRENCY }
    }

    /// Add a rule; all rules must hold for an item to be returned.
    pub fn filter(mut self, rule: impl Rule<Item> + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn filter_fn<F>(self, predicate: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.filter(SyncRule::new(predicate))
    }

    pub fn filter_by(self, criteria: FilterCriteria) -> Self {
        self.filter(criteria)
    }

    /// Number of items whose rules are evaluated at once.
    pub fn buffered(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Evaluate every rule and return matching items in snapshot order.
    ///
    /// The first rule error aborts the query.
    pub async fn all(self) -> Result<Vec<Item>> {
        let rules = self.rules;
        let matched: Vec<Option<Item>> = stream::iter(self.items)
            .map(|item| keep_if_all(&rules, item))
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        Ok(matched.into_iter().flatten().collect())
    }

    /// First matching item, if any.
    pub async fn first(self) -> Result<Option<Item>> {
        Ok(self.all().await?.into_iter().next())
    }
}

async fn keep_if_all(rules: &[Arc<dyn Rule<Item>>], item: Item) -> Result<Option<Item>> {
    for rule in rules {
        if !rule.evaluate(&item).await? {
            return Ok(None);
        }
    }
    Ok(Some(item))
}

impl std::fmt::Debug for ItemQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemQuery")
            .field("items", &self.items.len())
            .field("rules", &self.rules.len())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}
