//! Market data, catalog products and the seller fee schedule

use serde::{Deserialize, Serialize};

use crate::constants::{MINIMUM_TRANSACTION_FEE, PAYMENT_FEE_RATE, SHIPPING_FEE, TRANSACTION_FEE_RATE};

/// Seller fee schedule used to derive payouts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub transaction_fee_rate: f64,
    pub minimum_transaction_fee: f64,
    pub payment_fee_rate: f64,
    pub shipping_fee: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            transaction_fee_rate: TRANSACTION_FEE_RATE,
            minimum_transaction_fee: MINIMUM_TRANSACTION_FEE,
            payment_fee_rate: PAYMENT_FEE_RATE,
            shipping_fee: SHIPPING_FEE,
        }
    }
}

impl FeeSchedule {
    /// Amount the seller receives for a sale at `price`.
    pub fn payout(&self, price: f64) -> f64 {
        let transaction_fee = (self.transaction_fee_rate * price).max(self.minimum_transaction_fee);
        let payment_fee = self.payment_fee_rate * price;
        price - transaction_fee - payment_fee - self.shipping_fee
    }
}

/// Market snapshot for one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub product_id: String,
    pub variant_id: String,
    pub currency: String,
    pub lowest_ask: Option<f64>,
    pub highest_bid: Option<f64>,
    pub sell_faster: Option<f64>,
    pub earn_more: Option<f64>,
    pub flex_lowest_ask: Option<f64>,
}

/// A market amount paired with the payout it would yield
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketValue {
    pub amount: f64,
    pub payout: f64,
}

/// Market data for an item with payouts derived from the fee schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMarketData {
    pub currency: String,
    pub lowest_ask: Option<MarketValue>,
    pub highest_bid: Option<MarketValue>,
    pub sell_faster: Option<MarketValue>,
    pub earn_more: Option<MarketValue>,
    pub flex_lowest_ask: Option<MarketValue>,
}

impl ItemMarketData {
    pub fn from_market(market: &MarketData, fees: &FeeSchedule) -> Self {
        // Zero amounts mean "no data" on the marketplace.
        let value = |amount: Option<f64>| {
            amount.filter(|a| *a > 0.0).map(|amount| MarketValue { amount, payout: fees.payout(amount) })
        };
        Self {
            currency: market.currency.clone(),
            lowest_ask: value(market.lowest_ask),
            highest_bid: value(market.highest_bid),
            sell_faster: value(market.sell_faster),
            earn_more: value(market.earn_more),
            flex_lowest_ask: value(market.flex_lowest_ask),
        }
    }
}

/// Catalog product; invariant for the life of the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub style_id: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub url_key: String,
}
