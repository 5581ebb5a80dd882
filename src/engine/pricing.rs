//! Fiat ↔ asset conversion at the protocol's fixed-point scales.
//!
//! Asset amounts round down and fiat valuations round up, so escrow can never
//! end up worth less than the fiat the buyer owes.

use crate::domain::{FiatAmount, MarketRate, Rate, TokenAmount, RATE_SCALE};
use crate::error::EngineError;

/// Asset base units escrowed for a fiat amount:
/// `fiat × offer_rate / market_rate`, floored, in the asset's native scale.
pub fn token_amount_for(
    fiat: FiatAmount,
    offer_rate: Rate,
    market: MarketRate,
    decimals: u8,
) -> Result<TokenAmount, EngineError> {
    if market.as_micros() == 0 {
        return Err(EngineError::InvalidInput("market rate is zero".into()));
    }
    let scale = 10u128
        .checked_pow(decimals as u32)
        .ok_or_else(|| EngineError::InvalidInput("asset decimals out of range".into()))?;

    let numerator = (fiat.as_micros() as u128)
        .checked_mul(offer_rate.as_scaled() as u128)
        .and_then(|n| n.checked_mul(scale))
        .ok_or_else(|| EngineError::InvalidInput("conversion overflow".into()))?;
    let denominator = (market.as_micros() as u128) * RATE_SCALE as u128;

    Ok(TokenAmount::new(numerator / denominator))
}

/// Fiat value of an asset amount at the market rate, rounded up.
pub fn fiat_value(
    tokens: TokenAmount,
    market: MarketRate,
    decimals: u8,
) -> Result<FiatAmount, EngineError> {
    let scale = 10u128
        .checked_pow(decimals as u32)
        .ok_or_else(|| EngineError::InvalidInput("asset decimals out of range".into()))?;
    let numerator = tokens
        .as_base_units()
        .checked_mul(market.as_micros() as u128)
        .ok_or_else(|| EngineError::InvalidInput("conversion overflow".into()))?;

    let micros = numerator
        .checked_add(scale - 1)
        .ok_or_else(|| EngineError::InvalidInput("conversion overflow".into()))?
        / scale;
    u64::try_from(micros)
        .map(FiatAmount::new)
        .map_err(|_| EngineError::InvalidInput("fiat value overflow".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_amount_at_par() {
        // $100 at $50,000/BTC, 1.0x margin, 8 decimals -> 0.002 BTC.
        let tokens = token_amount_for(
            FiatAmount::new(100_000_000),
            Rate::new(10_000),
            MarketRate::new(50_000_000_000),
            8,
        )
        .unwrap();
        assert_eq!(tokens, TokenAmount::new(200_000));
    }

    #[test]
    fn test_token_amount_with_margin() {
        // A 5% margin buys 5% more escrow for the same fiat.
        let tokens = token_amount_for(
            FiatAmount::new(100_000_000),
            Rate::new(10_500),
            MarketRate::new(50_000_000_000),
            8,
        )
        .unwrap();
        assert_eq!(tokens, TokenAmount::new(210_000));
    }

    #[test]
    fn test_token_amount_rounds_down() {
        // $1 at $3/token with 0 decimals: 0.333... -> 0 whole tokens.
        let tokens = token_amount_for(
            FiatAmount::new(1_000_000),
            Rate::new(10_000),
            MarketRate::new(3_000_000),
            0,
        )
        .unwrap();
        assert_eq!(tokens, TokenAmount::new(0));
    }

    #[test]
    fn test_fiat_value_rounds_up() {
        // 1 base unit at $3/token, 6 decimals: 0.000003 fiat -> 1 micro, ceil to 3.
        let fiat = fiat_value(TokenAmount::new(1), MarketRate::new(3_000_000), 6).unwrap();
        assert_eq!(fiat, FiatAmount::new(3));

        // Exact division stays exact.
        let fiat = fiat_value(TokenAmount::new(200_000), MarketRate::new(50_000_000_000), 8)
            .unwrap();
        assert_eq!(fiat, FiatAmount::new(100_000_000));
    }

    #[test]
    fn test_fiat_value_overflow_rejected() {
        // The ceiling adjustment near u128::MAX must error, not wrap.
        let result = fiat_value(TokenAmount::new(u128::MAX), MarketRate::new(1), 6);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_market_rate_rejected() {
        let result = token_amount_for(
            FiatAmount::new(1_000_000),
            Rate::new(10_000),
            MarketRate::new(0),
            8,
        );
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }
}
