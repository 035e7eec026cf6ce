//! Inventory reconciliation
//!
//! Listings are grouped into [`Item`](stockx_domain::Item)s by an
//! [`InventoryIndex`], edits are staged in a [`ChangeSet`], and a
//! [`BatchReconciler`] turns them into batch operations. Most callers only
//! touch [`InventorySession`], which ties the pieces together and
//! guarantees a flush.

pub mod change_set;
pub mod index;
pub mod pricing;
pub mod query;
pub mod reconciler;
pub mod results;
pub mod session;

pub use change_set::ChangeSet;
pub use index::InventoryIndex;
pub use pricing::{Adjustment, MarketAnchor, PriceChange};
pub use query::{AsyncRule, FilterCriteria, ItemQuery, Rule, SyncRule};
pub use reconciler::BatchReconciler;
pub use results::{EntryFailure, FailedEntry, FlushReport, ItemResult, ItemStatus};
pub use session::{InventorySession, ScopeOutcome};
