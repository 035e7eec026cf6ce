//! Domain types and models
//!
//! Remote resources are immutable snapshots of what the API returned; the
//! inventory types are the client-side aggregates built from them.

pub mod inventory;
pub mod listing;
pub mod market;
pub mod operation;

pub use inventory::{to_cents, ChangeRecord, Item, ItemKey};
pub use listing::{ListingPage, ListingStatus, RemoteListing};
pub use market::{FeeSchedule, ItemMarketData, MarketData, MarketValue, Product};
pub use operation::{
    CreateListingInput, Operation, OperationInput, OperationItem, OperationItemStatus,
    OperationKind, OperationStatus, UpdateListingInput,
};
