//! Fee calculation and the external fee-collector seam.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::Asset;
use crate::error::EngineError;

const BASIS_POINTS_DIVISOR: u128 = 10_000;

/// Protocol fee on a released custody amount, in basis points, rounded down.
pub fn fee_for(amount: u128, fee_bps: u32) -> u128 {
    match amount.checked_mul(fee_bps as u128) {
        Some(product) => product / BASIS_POINTS_DIVISOR,
        // Near-u128::MAX amounts: divide first, losing at most bps-1 units.
        None => (amount / BASIS_POINTS_DIVISOR).saturating_mul(fee_bps as u128),
    }
}

/// Receives a cut of settled volume. The split/buy-back formula is external;
/// only this call interface is part of the engine. A failing collector aborts
/// the whole transition.
pub trait FeeCollector: Send + Sync {
    fn collect(&self, asset: &Asset, amount: u128) -> Result<(), EngineError>;
}

/// Default collector: accrues per-asset totals for later sweep.
#[derive(Debug, Default)]
pub struct AccruingCollector {
    totals: Mutex<HashMap<Asset, u128>>,
}

impl AccruingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collected(&self, asset: &Asset) -> u128 {
        self.totals
            .lock()
            .expect("fee collector lock poisoned")
            .get(asset)
            .copied()
            .unwrap_or(0)
    }
}

impl FeeCollector for AccruingCollector {
    fn collect(&self, asset: &Asset, amount: u128) -> Result<(), EngineError> {
        if amount == 0 {
            return Ok(());
        }
        let mut totals = self.totals.lock().expect("fee collector lock poisoned");
        let entry = totals.entry(asset.clone()).or_insert(0);
        *entry = entry.saturating_add(amount);
        Ok(())
    }
}
