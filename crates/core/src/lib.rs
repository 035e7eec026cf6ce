//! StockX engine core
//!
//! Request execution ([`RequestExecutor`]) and inventory reconciliation
//! ([`inventory`]) over an abstract [`RemoteApi`] transport.

pub mod client;
pub mod executor;
pub mod inventory;
pub mod ports;

pub use client::MarketplaceClient;
pub use executor::{RequestExecutor, RequestSpec, StockxRetryPolicy};
pub use inventory::{
    Adjustment, AsyncRule, BatchReconciler, ChangeSet, FilterCriteria, FlushReport, InventoryIndex,
    InventorySession, ItemQuery, ItemResult, ItemStatus, MarketAnchor, Rule, ScopeOutcome, SyncRule,
};
pub use ports::{ListingQuery, RemoteApi};
