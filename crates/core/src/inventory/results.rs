//! Flush outcomes
//!
//! A flush never fails as a whole. Each item gets an [`ItemResult`]; a
//! partial failure is a status in the report, not an error.

use serde::Serialize;
use stockx_domain::{ItemKey, OperationInput, OperationKind, StockxError};
use thiserror::Error;

/// Why a single batch entry did not take effect
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum EntryFailure {
    /// The operation completed but rejected this entry
    #[error("entry rejected: {0}")]
    Rejected(String),

    /// Submitting or polling the operation failed
    #[error(transparent)]
    Request(#[from] StockxError),

    /// Never submitted because an earlier fatal error stopped the flush
    #[error("not attempted: {0}")]
    NotAttempted(StockxError),
}

impl EntryFailure {
    /// Collapse into the error surfaced to callers; rejections become `Remote` 422.
    pub fn into_stockx_error(self) -> StockxError {
        match self {
            Self::Rejected(message) => StockxError::Remote { status: 422, message },
            Self::Request(error) | Self::NotAttempted(error) => error,
        }
    }
}

/// One entry that did not succeed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedEntry {
    pub kind: OperationKind,
    pub input: OperationInput,
    pub error: EntryFailure,
}

impl FailedEntry {
    /// Listing targeted by a failed update or delete
    pub fn listing_id(&self) -> Option<&str> {
        self.input.listing_id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemStatus {
    /// Every sub-operation succeeded
    Succeeded,
    /// At least one sub-operation failed or was skipped
    PartialFailure,
    /// Nothing was submitted for this item
    NotAttempted,
}

/// Outcome of flushing one item's changes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResult {
    pub key: ItemKey,
    pub status: ItemStatus,
    /// First failure, if any
    pub error: Option<EntryFailure>,
    pub failed: Vec<FailedEntry>,
    /// Listings created for this item
    pub created: Vec<String>,
    /// Creates that succeeded without the API echoing a listing id
    pub created_without_id: usize,
    /// Listings re-priced
    pub updated: Vec<String>,
    /// Listings removed
    pub deleted: Vec<String>,
}

impl ItemResult {
    pub(crate) fn new(key: ItemKey) -> Self {
        Self {
            key,
            status: ItemStatus::Succeeded,
            error: None,
            failed: Vec::new(),
            created: Vec::new(),
            created_without_id: 0,
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Succeeded
    }

    /// Listing ids of failed updates and deletes
    pub fn failed_listing_ids(&self) -> Vec<&str> {
        self.failed.iter().filter_map(FailedEntry::listing_id).collect()
    }

    /// Listings created, including those the API did not name
    pub fn created_count(&self) -> usize {
        self.created.len() + self.created_without_id
    }

    pub(crate) fn record_success(&mut self, kind: OperationKind, listing_id: Option<String>) {
        match (kind, listing_id) {
            (OperationKind::Create, Some(listing_id)) => self.created.push(listing_id),
            (OperationKind::Create, None) => self.created_without_id += 1,
            (OperationKind::Update, Some(listing_id)) => self.updated.push(listing_id),
            (OperationKind::Delete, Some(listing_id)) => self.deleted.push(listing_id),
            // Updates and deletes always carry the targeted listing id.
            (OperationKind::Update | OperationKind::Delete, None) => {}
        }
    }

    pub(crate) fn record_failure(&mut self, entry: FailedEntry) {
        if self.error.is_none() {
            self.error = Some(entry.error.clone());
        }
        self.failed.push(entry);
    }

    /// Derive the status once every entry has been recorded.
    pub(crate) fn finish(&mut self, attempted_entries: usize) {
        let skipped = self
            .failed
            .iter()
            .filter(|entry| matches!(entry.error, EntryFailure::NotAttempted(_)))
            .count();
        self.status = if self.failed.is_empty() {
            ItemStatus::Succeeded
        } else if skipped == attempted_entries && skipped == self.failed.len() {
            ItemStatus::NotAttempted
        } else {
            ItemStatus::PartialFailure
        };
    }
}

/// Result of one flush
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlushReport {
    pub results: Vec<ItemResult>,
}

impl FlushReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ItemResult> {
        self.with_status(ItemStatus::Succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemResult> {
        self.with_status(ItemStatus::PartialFailure)
    }

    pub fn not_attempted(&self) -> impl Iterator<Item = &ItemResult> {
        self.with_status(ItemStatus::NotAttempted)
    }

    /// True when every item succeeded (vacuously true for an empty flush)
    pub fn is_success(&self) -> bool {
        self.results.iter().all(ItemResult::is_success)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&ItemResult> {
        self.results.iter().find(|result| &result.key == key)
    }

    pub fn created_count(&self) -> usize {
        self.results.iter().map(ItemResult::created_count).sum()
    }

    pub fn updated_count(&self) -> usize {
        self.results.iter().map(|r| r.updated.len()).sum()
    }

    pub fn deleted_count(&self) -> usize {
        self.results.iter().map(|r| r.deleted.len()).sum()
    }

    fn with_status(&self, status: ItemStatus) -> impl Iterator<Item = &ItemResult> {
        self.results.iter().filter(move |result| result.status == status)
    }
}
