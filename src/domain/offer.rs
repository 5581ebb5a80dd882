//! Standing trade terms a deal is opened against.

use serde::{Deserialize, Serialize};

use super::primitives::{AccountId, Asset, Fiat, FiatAmount, OfferId, PaymentMethod, Rate};
use crate::error::EngineError;

/// Immutable trade terms plus a mutable `disabled` flag. Owned by its creator;
/// never deleted, only disabled. All mutation goes through the owner-gated
/// setters below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub owner: AccountId,
    /// True if the owner is selling the asset; false if buying.
    pub is_sell: bool,
    pub asset: Asset,
    pub fiat: Fiat,
    pub method: PaymentMethod,
    /// Margin over market, ×10_000.
    pub rate: Rate,
    pub min_fiat: FiatAmount,
    pub max_fiat: FiatAmount,
    pub terms: String,
    pub disabled: bool,
}

impl Offer {
    /// Validate invariants shared by creation and the setters.
    fn check_limits(min_fiat: FiatAmount, max_fiat: FiatAmount) -> Result<(), EngineError> {
        if min_fiat > max_fiat {
            return Err(EngineError::InvalidInput(
                "min_fiat exceeds max_fiat".into(),
            ));
        }
        if max_fiat.is_zero() {
            return Err(EngineError::InvalidInput("max_fiat is zero".into()));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OfferId,
        owner: AccountId,
        is_sell: bool,
        asset: Asset,
        fiat: Fiat,
        method: PaymentMethod,
        rate: Rate,
        min_fiat: FiatAmount,
        max_fiat: FiatAmount,
        terms: String,
    ) -> Result<Self, EngineError> {
        Self::check_limits(min_fiat, max_fiat)?;
        Ok(Offer {
            id,
            owner,
            is_sell,
            asset,
            fiat,
            method,
            rate,
            min_fiat,
            max_fiat,
            terms,
            disabled: false,
        })
    }

    fn require_owner(&self, caller: &AccountId) -> Result<(), EngineError> {
        if caller != &self.owner {
            return Err(EngineError::Unauthorized(
                "only the offer owner may modify an offer".into(),
            ));
        }
        Ok(())
    }

    pub fn set_rate(&mut self, caller: &AccountId, rate: Rate) -> Result<(), EngineError> {
        self.require_owner(caller)?;
        self.rate = rate;
        Ok(())
    }

    pub fn set_limits(
        &mut self,
        caller: &AccountId,
        min_fiat: FiatAmount,
        max_fiat: FiatAmount,
    ) -> Result<(), EngineError> {
        self.require_owner(caller)?;
        Self::check_limits(min_fiat, max_fiat)?;
        self.min_fiat = min_fiat;
        self.max_fiat = max_fiat;
        Ok(())
    }

    pub fn set_terms(&mut self, caller: &AccountId, terms: String) -> Result<(), EngineError> {
        self.require_owner(caller)?;
        self.terms = terms;
        Ok(())
    }

    pub fn set_disabled(&mut self, caller: &AccountId, disabled: bool) -> Result<(), EngineError> {
        self.require_owner(caller)?;
        self.disabled = disabled;
        Ok(())
    }

    /// Whether `amount` falls inside the offer's fiat limits.
    pub fn accepts_amount(&self, amount: FiatAmount) -> bool {
        amount >= self.min_fiat && amount <= self.max_fiat
    }
}
