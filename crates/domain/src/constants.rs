//! Marketplace constants
//!
//! Defaults used by configuration and by the reconciliation engine.

// Endpoints
pub const DEFAULT_API_BASE_URL: &str = "https://api.stockx.com/v2";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.stockx.com/oauth/token";
pub const AUTH_AUDIENCE: &str = "gateway.stockx.com";
pub const API_KEY_HEADER: &str = "x-api-key";

// Request execution
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 1;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_BASE_DELAY_SECS: u64 = 2;
pub const DEFAULT_RETRY_MAX_DELAY_SECS: u64 = 30;
pub const DEFAULT_RETRY_TOTAL_SECS: u64 = 60;
pub const DEFAULT_CREDENTIAL_SKEW_SECS: u64 = 60;

// Response cache
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;
pub const MARKET_DATA_TTL_SECS: u64 = 30;

// Batch operations
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_PARALLEL: usize = 4;
pub const DEFAULT_POLL_INITIAL_SECS: u64 = 1;
pub const DEFAULT_POLL_MAX_SECS: u64 = 16;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 60;
/// Largest quantity target accepted for one item
pub const MAX_ITEM_QUANTITY: u32 = 10_000;

// Inventory
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_PAGE_SIZE: u32 = 100;

// Seller fees
pub const TRANSACTION_FEE_RATE: f64 = 0.09;
pub const MINIMUM_TRANSACTION_FEE: f64 = 5.0;
pub const PAYMENT_FEE_RATE: f64 = 0.03;
pub const SHIPPING_FEE: f64 = 7.0;
