//! Pending user mutations
//!
//! Edits are coalesced per item: last write wins per field, and quantity is
//! an absolute target rather than a delta.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use stockx_domain::constants::MAX_ITEM_QUANTITY;
use stockx_domain::{ChangeRecord, ItemKey, Result, StockxError};

#[derive(Debug, Default)]
pub struct ChangeSet {
    records: Mutex<BTreeMap<ItemKey, ChangeRecord>>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new target price for `key`.
    ///
    /// # Errors
    /// `InvalidInput` for non-finite or non-positive prices.
    pub fn record_price_change(&self, key: &ItemKey, price: f64) -> Result<()> {
        if !price.is_finite() || price <= 0.0 {
            return Err(StockxError::InvalidInput(format!("invalid price {price} for {key}")));
        }
        self.records
            .lock()
            .entry(key.clone())
            .or_insert_with(|| ChangeRecord::new(key.clone()))
            .desired_price = Some(price);
        Ok(())
    }

    /// Record a new target quantity for `key`.
    ///
    /// # Errors
    /// `InvalidInput` for negative quantities and targets above
    /// [`MAX_ITEM_QUANTITY`].
    pub fn record_quantity_change(&self, key: &ItemKey, quantity: i64) -> Result<()> {
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|quantity| *quantity <= MAX_ITEM_QUANTITY)
            .ok_or_else(|| {
                StockxError::InvalidInput(format!(
                    "invalid quantity {quantity} for {key}; expected 0..={MAX_ITEM_QUANTITY}"
                ))
            })?;
        self.records
            .lock()
            .entry(key.clone())
            .or_insert_with(|| ChangeRecord::new(key.clone()))
            .desired_quantity = Some(quantity);
        Ok(())
    }

    /// Take every pending record, leaving the set empty.
    pub fn drain(&self) -> Vec<ChangeRecord> {
        std::mem::take(&mut *self.records.lock()).into_values().collect()
    }

    pub fn get(&self, key: &ItemKey) -> Option<ChangeRecord> {
        self.records.lock().get(key).cloned()
    }

    pub fn discard(&self, key: &ItemKey) -> Option<ChangeRecord> {
        self.records.lock().remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }
}

impl From<Vec<ChangeRecord>> for ChangeSet {
    fn from(records: Vec<ChangeRecord>) -> Self {
        let records = records.into_iter().map(|record| (record.item_key.clone(), record)).collect();
        Self { records: Mutex::new(records) }
    }
}
