//! Observability bootstrap
//!
//! The engine logs through `tracing` everywhere; this module installs the
//! subscriber that renders those events.

pub mod logging;

pub use logging::{build_filter, init_logging};
