//! Fixed rate source for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{RateSource, RateSourceError};
use crate::domain::{Asset, Fiat, MarketRate};

/// Rate source that serves a fixed table of rates.
#[derive(Debug, Default)]
pub struct FixedRateSource {
    rates: Mutex<HashMap<(String, String), u64>>,
}

impl FixedRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&self, asset: &str, fiat: &str, micros: u64) {
        self.rates
            .lock()
            .expect("rates lock poisoned")
            .insert((asset.to_string(), fiat.to_string()), micros);
    }
}

#[async_trait]
impl RateSource for FixedRateSource {
    async fn market_rate(&self, asset: &Asset, fiat: &Fiat) -> Result<MarketRate, RateSourceError> {
        self.rates
            .lock()
            .expect("rates lock poisoned")
            .get(&(asset.as_str().to_string(), fiat.as_str().to_string()))
            .map(|&m| MarketRate::new(m))
            .ok_or_else(|| RateSourceError::UnknownPair {
                asset: asset.as_str().to_string(),
                fiat: fiat.as_str().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_rate_lookup() {
        let source = FixedRateSource::new();
        source.set_rate("BTC", "USD", 50_000_000_000);

        let rate = source
            .market_rate(&Asset::new("BTC"), &Fiat::new("USD"))
            .await
            .unwrap();
        assert_eq!(rate.as_micros(), 50_000_000_000);

        assert!(matches!(
            source
                .market_rate(&Asset::new("ETH"), &Fiat::new("USD"))
                .await,
            Err(RateSourceError::UnknownPair { .. })
        ));
    }
}
