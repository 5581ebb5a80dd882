//! Custody accounting: per-account balances, per-deal escrow, assertion bonds.
//!
//! The vault is a pure bookkeeping structure; the lifecycle engine decides
//! when value moves. Asset balances and escrow are denominated in the asset's
//! base units; assertion collateral is a separate protocol-wide balance.

use std::collections::HashMap;

use crate::domain::{AccountId, Asset, DealId};
use crate::error::EngineError;

#[derive(Debug, Default)]
pub struct Vault {
    balances: HashMap<(AccountId, Asset), u128>,
    collateral: HashMap<AccountId, u128>,
    escrow: HashMap<DealId, u128>,
    bonds: HashMap<DealId, (AccountId, u128)>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&mut self, account: &AccountId, asset: &Asset, amount: u128) {
        if amount == 0 {
            return;
        }
        let entry = self
            .balances
            .entry((account.clone(), asset.clone()))
            .or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn balance_of(&self, account: &AccountId, asset: &Asset) -> u128 {
        self.balances
            .get(&(account.clone(), asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn credit_collateral(&mut self, account: &AccountId, amount: u128) {
        if amount == 0 {
            return;
        }
        let entry = self.collateral.entry(account.clone()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn collateral_of(&self, account: &AccountId) -> u128 {
        self.collateral.get(account).copied().unwrap_or(0)
    }

    /// Move `amount` from the seller's balance into the deal's escrow.
    pub fn fund_escrow(
        &mut self,
        deal: DealId,
        seller: &AccountId,
        asset: &Asset,
        amount: u128,
    ) -> Result<(), EngineError> {
        let key = (seller.clone(), asset.clone());
        let available = self.balances.get(&key).copied().unwrap_or(0);
        if available < amount {
            return Err(EngineError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        self.balances.insert(key, available - amount);
        debug_assert!(!self.escrow.contains_key(&deal));
        self.escrow.insert(deal, amount);
        Ok(())
    }

    pub fn escrow_of(&self, deal: DealId) -> u128 {
        self.escrow.get(&deal).copied().unwrap_or(0)
    }

    /// Remove and return the deal's escrowed amount. The caller decides where
    /// the value goes; a missing escrow entry drains as zero.
    pub fn drain_escrow(&mut self, deal: DealId) -> u128 {
        self.escrow.remove(&deal).unwrap_or(0)
    }

    /// Lock `amount` of the asserter's collateral behind a deal's assertion.
    pub fn lock_bond(
        &mut self,
        deal: DealId,
        asserter: &AccountId,
        amount: u128,
    ) -> Result<(), EngineError> {
        let available = self.collateral_of(asserter);
        if available < amount {
            return Err(EngineError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        self.collateral.insert(asserter.clone(), available - amount);
        self.bonds.insert(deal, (asserter.clone(), amount));
        Ok(())
    }

    /// Return a locked bond to its asserter.
    pub fn release_bond(&mut self, deal: DealId) {
        if let Some((asserter, amount)) = self.bonds.remove(&deal) {
            self.credit_collateral(&asserter, amount);
        }
    }
}
