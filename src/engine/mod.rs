//! Deterministic settlement engine for the deal lifecycle.
//!
//! Everything in this module is synchronous and pure with respect to time:
//! transitions take a caller-supplied `Timestamp` and either mutate exactly
//! one aggregate plus its side effects, or fail with a specific guard error
//! and no partial mutation.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::config::Config;
use crate::domain::{AccountId, Claim, DealId, DealState};

pub mod assertions;
pub mod fees;
pub mod lifecycle;
pub mod permissions;
pub mod pricing;
pub mod reputation;
pub mod vault;

pub use assertions::AssertionBook;
pub use fees::{fee_for, AccruingCollector, FeeCollector};
pub use lifecycle::{DealEngine, NewOffer, TransitionOutcome};
pub use permissions::{authorize, DealAction};
pub use reputation::ReputationLedger;
pub use vault::Vault;

/// Change notification emitted by a transition, journaled by the API layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DealEvent {
    StateChanged {
        deal: DealId,
        state: DealState,
        actor: AccountId,
    },
    Message {
        deal: DealId,
        sender: AccountId,
        body: String,
    },
    FeedbackGiven {
        deal: DealId,
        to: AccountId,
        upvote: bool,
        message: String,
    },
    ClaimAsserted {
        deal: DealId,
        claim: Claim,
        asserter: AccountId,
        bond: u128,
    },
    ClaimChallenged {
        deal: DealId,
        challenger: AccountId,
    },
}

impl DealEvent {
    pub fn deal_id(&self) -> DealId {
        match self {
            DealEvent::StateChanged { deal, .. }
            | DealEvent::Message { deal, .. }
            | DealEvent::FeedbackGiven { deal, .. }
            | DealEvent::ClaimAsserted { deal, .. }
            | DealEvent::ClaimChallenged { deal, .. } => *deal,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DealEvent::StateChanged { .. } => "state",
            DealEvent::Message { .. } => "message",
            DealEvent::FeedbackGiven { .. } => "feedback",
            DealEvent::ClaimAsserted { .. } => "assertion",
            DealEvent::ClaimChallenged { .. } => "challenge",
        }
    }
}

/// Protocol parameters the engine needs, lifted out of `Config` so tests can
/// construct them directly.
#[derive(Debug, Clone)]
pub struct EngineParams {
    pub fee_bps: u32,
    pub accept_window_secs: i64,
    pub payment_window_secs: i64,
    pub assertion_liveness_secs: i64,
    pub assertion_bond_min: u128,
    pub stewards: HashSet<AccountId>,
    /// Whitelisted assets and their native decimal scales.
    pub assets: HashMap<String, u8>,
    pub fiats: HashSet<String>,
    pub methods: HashSet<String>,
}

impl EngineParams {
    pub fn from_config(config: &Config) -> Self {
        EngineParams {
            fee_bps: config.fee_bps,
            accept_window_secs: config.accept_window_secs,
            payment_window_secs: config.payment_window_secs,
            assertion_liveness_secs: config.assertion_liveness_secs,
            assertion_bond_min: config.assertion_bond_min,
            stewards: config.stewards.iter().cloned().map(AccountId::new).collect(),
            assets: config
                .assets
                .iter()
                .map(|a| (a.symbol.clone(), a.decimals))
                .collect(),
            fiats: config.fiats.iter().cloned().collect(),
            methods: config.methods.iter().cloned().collect(),
        }
    }
}
