//! Remote listing snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_wire_status_conversions;

/// Listing lifecycle status as reported by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    Inactive,
    Active,
    Deleted,
    Canceled,
    Matched,
    Completed,
}

impl_wire_status_conversions!(ListingStatus {
    Inactive => "INACTIVE",
    Active => "ACTIVE",
    Deleted => "DELETED",
    Canceled => "CANCELED",
    Matched => "MATCHED",
    Completed => "COMPLETED",
});

impl ListingStatus {
    /// Whether the listing is still open for sale and therefore part of the
    /// seller's editable inventory.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Active | Self::Inactive)
    }
}

/// One sellable unit on the marketplace. Quantity is always 1 server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteListing {
    pub listing_id: String,
    pub variant_id: String,
    pub product_id: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default = "one")]
    pub quantity: u32,
    pub status: ListingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// Size label of the variant (e.g. "10.5")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn one() -> u32 {
    1
}

/// One page of the seller's listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub listings: Vec<RemoteListing>,
    pub page_number: u32,
    pub has_next_page: bool,
}
