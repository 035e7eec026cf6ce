//! Asynchronous server-side operations
//!
//! Every mutating call returns an [`Operation`] handle. Batch operations
//! report one [`OperationItem`] per submitted entry once terminal.

use serde::{Deserialize, Serialize};

use super::inventory::ItemKey;
use crate::impl_wire_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl_wire_status_conversions!(OperationKind {
    Create => "create",
    Update => "update",
    Delete => "delete",
});

impl OperationKind {
    /// Path segment of the batch endpoint for this kind
    pub fn batch_path(&self) -> &'static str {
        match self {
            Self::Create => "create-listing",
            Self::Update => "update-listing",
            Self::Delete => "delete-listing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Succeeded,
    Failed,
}

impl_wire_status_conversions!(OperationStatus {
    Pending => "PENDING",
    Succeeded => "SUCCEEDED",
    Failed => "FAILED",
});

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Per-entry status inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationItemStatus {
    Queued,
    Completed,
    Failed,
}

impl_wire_status_conversions!(OperationItemStatus {
    Queued => "QUEUED",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

/// Create one or more units of a variant at a price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingInput {
    pub variant_id: String,
    pub amount: f64,
    pub currency: String,
    pub quantity: u32,
    pub active: bool,
}

impl CreateListingInput {
    /// One active unit at the key's price
    pub fn single(key: &ItemKey) -> Self {
        Self {
            variant_id: key.variant_id.clone(),
            amount: key.amount(),
            currency: key.currency.clone(),
            quantity: 1,
            active: true,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.variant_id.clone(), self.amount, self.currency.clone())
    }
}

/// Re-price one existing listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingInput {
    pub listing_id: String,
    pub amount: f64,
    pub currency: String,
}

/// Echo of the submitted entry, used to attribute outcomes back to items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OperationInput {
    Create { variant_id: String, amount: f64, currency: String },
    Update { listing_id: String, amount: f64 },
    Delete { listing_id: String },
}

impl OperationInput {
    /// Listing targeted by an update or delete entry
    pub fn listing_id(&self) -> Option<&str> {
        match self {
            Self::Update { listing_id, .. } | Self::Delete { listing_id } => Some(listing_id),
            Self::Create { .. } => None,
        }
    }

    /// Equivalence key produced by a create entry
    pub fn create_key(&self) -> Option<ItemKey> {
        match self {
            Self::Create { variant_id, amount, currency } => {
                Some(ItemKey::new(variant_id.clone(), *amount, currency.clone()))
            }
            _ => None,
        }
    }
}

impl From<&CreateListingInput> for OperationInput {
    fn from(input: &CreateListingInput) -> Self {
        Self::Create {
            variant_id: input.variant_id.clone(),
            amount: input.amount,
            currency: input.currency.clone(),
        }
    }
}

impl From<&UpdateListingInput> for OperationInput {
    fn from(input: &UpdateListingInput) -> Self {
        Self::Update { listing_id: input.listing_id.clone(), amount: input.amount }
    }
}

/// Outcome of one batch entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationItem {
    pub input: OperationInput,
    pub status: OperationItemStatus,
    /// Listing created or affected by the entry
    pub listing_id: Option<String>,
    pub error: Option<String>,
}

impl OperationItem {
    pub fn is_failed(&self) -> bool {
        self.status == OperationItemStatus::Failed
    }
}

/// Handle of a server-side job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub error: Option<String>,
    /// Per-entry outcomes; populated once the operation is terminal
    #[serde(default)]
    pub items: Vec<OperationItem>,
}

impl Operation {
    pub fn pending(operation_id: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            operation_id: operation_id.into(),
            kind,
            status: OperationStatus::Pending,
            error: None,
            items: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn failed_items(&self) -> impl Iterator<Item = &OperationItem> {
        self.items.iter().filter(|item| item.is_failed())
    }
}
