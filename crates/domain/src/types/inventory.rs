//! Inventory aggregates
//!
//! An [`Item`] groups every listing that shares the same variant, price and
//! currency. Prices are compared in integer cents so the grouping key is
//! hashable and immune to float noise.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Convert a decimal amount to integer cents.
#[allow(clippy::cast_possible_truncation)]
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Equivalence key of an [`Item`]: (variant, price, currency)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub variant_id: String,
    amount_cents: i64,
    pub currency: String,
}

impl ItemKey {
    pub fn new(variant_id: impl Into<String>, amount: f64, currency: impl Into<String>) -> Self {
        Self { variant_id: variant_id.into(), amount_cents: to_cents(amount), currency: currency.into() }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn amount(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }

    pub fn amount_cents(&self) -> i64 {
        self.amount_cents
    }

    /// Same variant and currency at another price.
    #[must_use]
    pub fn with_amount(&self, amount: f64) -> Self {
        Self::new(self.variant_id.clone(), amount, self.currency.clone())
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:.2} {}", self.variant_id, self.amount(), self.currency)
    }
}

/// Client-side aggregate of listings sharing an [`ItemKey`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub key: ItemKey,
    pub product_id: String,
    pub style_id: Option<String>,
    pub name: Option<String>,
    pub size: Option<String>,
    pub price: f64,
    pub currency: String,
    /// Number of constituent listings
    pub quantity: u32,
    /// Constituent listing ids, oldest first
    pub listing_ids: Vec<String>,
    /// Seller payout at `price` after fees
    pub payout: f64,
}

impl Item {
    pub fn variant_id(&self) -> &str {
        &self.key.variant_id
    }
}

/// Pending user edits for one Item. Quantity is an absolute target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub item_key: ItemKey,
    pub desired_price: Option<f64>,
    pub desired_quantity: Option<u32>,
}

impl ChangeRecord {
    pub fn new(item_key: ItemKey) -> Self {
        Self { item_key, desired_price: None, desired_quantity: None }
    }

    pub fn is_noop(&self) -> bool {
        self.desired_price.is_none() && self.desired_quantity.is_none()
    }
}
