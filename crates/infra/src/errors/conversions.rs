//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use serde_json::Error as JsonError;
use stockx_domain::StockxError;
use thiserror::Error;
use url::ParseError as UrlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct InfraError(pub StockxError);

impl From<InfraError> for StockxError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<StockxError> for InfraError {
    fn from(value: StockxError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoStockxError {
    fn into_stockx(self) -> StockxError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → StockxError */
/* -------------------------------------------------------------------------- */

impl IntoStockxError for HttpError {
    fn into_stockx(self) -> StockxError {
        if self.is_timeout() {
            return StockxError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return StockxError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
            return StockxError::from_status(code, message);
        }

        if self.is_decode() {
            return StockxError::Decode(self.to_string());
        }

        if self.is_builder() {
            return StockxError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        StockxError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_stockx())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → StockxError */
/* -------------------------------------------------------------------------- */

impl IntoStockxError for JsonError {
    fn into_stockx(self) -> StockxError {
        StockxError::Decode(format!("malformed response body: {self}"))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_stockx())
    }
}

/* -------------------------------------------------------------------------- */
/* url::ParseError → StockxError */
/* -------------------------------------------------------------------------- */

impl IntoStockxError for UrlError {
    fn into_stockx(self) -> StockxError {
        StockxError::Config(format!("invalid URL: {self}"))
    }
}

impl From<UrlError> for InfraError {
    fn from(value: UrlError) -> Self {
        InfraError(value.into_stockx())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
