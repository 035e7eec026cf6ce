//! Error types used throughout the engine

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the StockX engine
///
/// `Clone` so one failure can be reported to every item of a batch and to
/// every waiter of a shared computation.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum StockxError {
    /// Credential invalid or unrefreshable; fatal for the session
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Throttle capacity not available within {waited:?}")]
    ThrottleTimeout { waited: Duration },

    /// Every retry attempt failed; carries the last transient failure
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: Box<StockxError> },

    /// Non-retryable response from the API
    #[error("Remote error {status}: {message}")]
    Remote { status: u16, message: String },

    /// Retryable response (408, 429, 5xx)
    #[error("Transient remote error {status}: {message}")]
    Transient {
        status: u16,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_after: Option<Duration>,
    },

    /// Connection or timeout failure before a response arrived
    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation {operation_id} not terminal after {waited:?}")]
    OperationTimeout { operation_id: String, waited: Duration },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl StockxError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Network(_))
    }

    /// Whether the error ends the whole session rather than one request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } | Self::Transient { status, .. } => Some(*status),
            Self::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Build the error for an HTTP failure response, classifying by status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Auth(message),
            408 | 429 | 500..=599 => Self::Transient { status, message, retry_after: None },
            _ => Self::Remote { status, message },
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, StockxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(StockxError::from_status(401, "expired"), StockxError::Auth(_)));
        let forbidden = StockxError::from_status(403, "insufficient permissions");
        assert!(matches!(forbidden, StockxError::Remote { status: 403, .. }));
        assert!(!forbidden.is_fatal());
        assert!(StockxError::from_status(429, "slow down").is_retryable());
        assert!(StockxError::from_status(503, "unavailable").is_retryable());
        assert!(StockxError::from_status(599, "edge").is_retryable());
        assert!(!StockxError::from_status(404, "missing").is_retryable());
        assert!(!StockxError::from_status(422, "bad amount").is_retryable());
    }

    #[test]
    fn test_exhausted_reports_inner_status() {
        let err = StockxError::RetryExhausted {
            attempts: 5,
            last: Box::new(StockxError::from_status(502, "bad gateway")),
        };
        assert_eq!(err.status(), Some(502));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("5 attempts"));
    }

    #[test]
    fn test_serializes_with_tag() {
        let json = serde_json::to_value(StockxError::Auth("revoked".into())).unwrap();
        assert_eq!(json["type"], "Auth");
        assert_eq!(json["details"], "revoked");
    }
}
