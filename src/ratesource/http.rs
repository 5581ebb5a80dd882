//! HTTP rate source client.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{RateSource, RateSourceError};
use crate::domain::{Asset, Fiat, MarketRate};

/// Rate source backed by a JSON price API.
///
/// Queries `{base_url}/rate?asset={asset}&fiat={fiat}` and expects a body of
/// the form `{"rate_micros": 50000000000}`.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: Client,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn market_rate(&self, asset: &Asset, fiat: &Fiat) -> Result<MarketRate, RateSourceError> {
        debug!("Fetching market rate for asset={}, fiat={}", asset, fiat);

        let url = format!("{}/rate", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("asset", asset.as_str()), ("fiat", fiat.as_str())])
            .send()
            .await
            .map_err(|e| RateSourceError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RateSourceError::UnknownPair {
                asset: asset.as_str().to_string(),
                fiat: fiat.as_str().to_string(),
            });
        }
        if !status.is_success() {
            return Err(RateSourceError::HttpError {
                status: status.as_u16(),
                message: "Upstream error".to_string(),
            });
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| RateSourceError::ParseError(e.to_string()))?;

        let micros = body
            .get("rate_micros")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                RateSourceError::ParseError("Missing rate_micros field".to_string())
            })?;
        if micros == 0 {
            return Err(RateSourceError::ParseError("Zero market rate".to_string()));
        }

        Ok(MarketRate::new(micros))
    }
}
