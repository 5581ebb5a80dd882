//! Market rate abstraction for valuing an asset in a fiat currency.

use async_trait::async_trait;
use std::fmt;

use crate::domain::{Asset, Fiat, MarketRate};

pub mod fixed;
pub mod http;

pub use fixed::FixedRateSource;
pub use http::HttpRateSource;

/// Source of spot market rates.
///
/// A rate is fiat micros per whole token, so 50_000_000_000 means one whole
/// token is worth 50,000.00 fiat units. The engine consumes the rate exactly
/// once per deal, at creation.
#[async_trait]
pub trait RateSource: Send + Sync + fmt::Debug {
    async fn market_rate(&self, asset: &Asset, fiat: &Fiat) -> Result<MarketRate, RateSourceError>;
}

/// Error type for rate source operations.
#[derive(Debug, Clone)]
pub enum RateSourceError {
    /// Network error (connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (4xx/5xx from the upstream)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// The upstream has no rate for this asset/fiat pair
    UnknownPair { asset: String, fiat: String },
}

impl fmt::Display for RateSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            RateSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            RateSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            RateSourceError::UnknownPair { asset, fiat } => {
                write!(f, "No market rate for {}/{}", asset, fiat)
            }
        }
    }
}

impl std::error::Error for RateSourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_source_error_display() {
        let err = RateSourceError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = RateSourceError::HttpError {
            status: 502,
            message: "Bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 502: Bad gateway");

        let err = RateSourceError::UnknownPair {
            asset: "BTC".to_string(),
            fiat: "JPY".to_string(),
        };
        assert_eq!(err.to_string(), "No market rate for BTC/JPY");
    }
}
