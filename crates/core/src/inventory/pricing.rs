//! Market-relative repricing
//!
//! Stages price changes relative to a market value (lowest ask, the
//! marketplace's "sell faster" and "earn more" suggestions, ...) for every
//! item that passes a condition. Nothing is sent until the session flushes.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use stockx_domain::{to_cents, Item, ItemKey, ItemMarketData, MarketValue, Result};
use tracing::{debug, info};

use super::query::Rule;
use super::session::InventorySession;

/// Market value a new price is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketAnchor {
    LowestAsk,
    HighestBid,
    SellFaster,
    EarnMore,
    FlexLowestAsk,
}

impl MarketAnchor {
    pub fn value(&self, market: &ItemMarketData) -> Option<MarketValue> {
        match self {
            Self::LowestAsk => market.lowest_ask,
            Self::HighestBid => market.highest_bid,
            Self::SellFaster => market.sell_faster,
            Self::EarnMore => market.earn_more,
            Self::FlexLowestAsk => market.flex_lowest_ask,
        }
    }
}

/// How far below the anchor to price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Adjustment {
    /// Subtract a fixed amount
    Absolute(f64),
    /// Subtract a fraction of the anchor (0.05 = 5%)
    Percentage(f64),
}

impl Default for Adjustment {
    fn default() -> Self {
        Self::Absolute(0.0)
    }
}

impl Adjustment {
    /// Adjusted amount, rounded to cents
    pub fn apply(&self, amount: f64) -> f64 {
        let adjusted = match self {
            Self::Absolute(by) => amount - by,
            Self::Percentage(by) => amount * (1.0 - by),
        };
        to_cents(adjusted) as f64 / 100.0
    }
}

/// A staged repricing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceChange {
    pub key: ItemKey,
    pub previous: f64,
    pub price: f64,
}

impl InventorySession {
    /// Price each matching item `by` below the current lowest ask.
    pub async fn beat_lowest_ask(
        &self,
        items: &[Item],
        by: Adjustment,
        condition: &dyn Rule<Item>,
    ) -> Result<Vec<PriceChange>> {
        self.beat_market(items, MarketAnchor::LowestAsk, by, condition).await
    }

    pub async fn beat_sell_faster(
        &self,
        items: &[Item],
        by: Adjustment,
        condition: &dyn Rule<Item>,
    ) -> Result<Vec<PriceChange>> {
        self.beat_market(items, MarketAnchor::SellFaster, by, condition).await
    }

    pub async fn beat_earn_more(
        &self,
        items: &[Item],
        by: Adjustment,
        condition: &dyn Rule<Item>,
    ) -> Result<Vec<PriceChange>> {
        self.beat_market(items, MarketAnchor::EarnMore, by, condition).await
    }

    /// Stage `anchor - by` as the new price of every item passing `condition`.
    ///
    /// Items without a value for the anchor, or whose adjusted price would
    /// not be positive, are left alone. Market data is fetched with the
    /// session's parallelism.
    pub async fn beat_market(
        &self,
        items: &[Item],
        anchor: MarketAnchor,
        by: Adjustment,
        condition: &dyn Rule<Item>,
    ) -> Result<Vec<PriceChange>> {
        let targets: Vec<Option<(Item, f64)>> = stream::iter(items)
            .map(|item| self.beat_target(item, anchor, by, condition))
            .buffered(self.parallelism())
            .try_collect()
            .await?;

        let changes = self.stage_prices(targets.into_iter().flatten())?;
        info!(?anchor, repriced = changes.len(), "market repricing staged");
        Ok(changes)
    }

    async fn beat_target(
        &self,
        item: &Item,
        anchor: MarketAnchor,
        by: Adjustment,
        condition: &dyn Rule<Item>,
    ) -> Result<Option<(Item, f64)>> {
        if !condition.evaluate(item).await? {
            return Ok(None);
        }
        let market = self.market_data(item).await?;
        let Some(value) = anchor.value(&market) else {
            debug!(item = %item.key, ?anchor, "no market value; skipping");
            return Ok(None);
        };
        Ok(Some((item.clone(), by.apply(value.amount))))
    }

    /// Stage a fixed `price` for every item passing `condition`.
    pub async fn change_price(
        &self,
        items: &[Item],
        price: f64,
        condition: &dyn Rule<Item>,
    ) -> Result<Vec<PriceChange>> {
        let mut targets = Vec::new();
        for item in items {
            if condition.evaluate(item).await? {
                targets.push((item.clone(), price));
            }
        }
        self.stage_prices(targets)
    }

    fn stage_prices(&self, targets: impl IntoIterator<Item = (Item, f64)>) -> Result<Vec<PriceChange>> {
        let mut changes = Vec::new();
        for (item, price) in targets {
            if price <= 0.0 {
                debug!(item = %item.key, price, "adjusted price not positive; skipping");
                continue;
            }
            if to_cents(price) == to_cents(item.price) {
                continue;
            }
            self.set_price(&item.key, price)?;
            changes.push(PriceChange { key: item.key, previous: item.price, price });
        }
        Ok(changes)
    }
}
