//! # StockX Domain
//!
//! Business domain types and models for the StockX engine.
//!
//! This crate contains:
//! - Remote resource snapshots (listings, operations, market data)
//! - Inventory aggregates (Item, ItemKey, ChangeRecord)
//! - Domain error type and Result definition
//! - Configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other engine crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
