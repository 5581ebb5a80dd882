//! One escrow instance tracking a single trade from creation to settlement.

use serde::{Deserialize, Serialize};

use super::offer::Offer;
use super::primitives::{
    AccountId, Asset, DealId, Fiat, FiatAmount, OfferId, PaymentMethod, Rate, Timestamp,
    TokenAmount,
};

/// Deal lifecycle states. `Created` is initial; `Cancelled` and `Released` are
/// terminal; `Resolved` is a pass-through reached only from `Disputed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealState {
    Created,
    Accepted,
    Funded,
    Paid,
    Disputed,
    Cancelled,
    Resolved,
    Released,
}

impl DealState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DealState::Cancelled | DealState::Released)
    }

    /// Custody must hold exactly `token_amount` in these states, zero otherwise.
    pub fn holds_custody(&self) -> bool {
        matches!(
            self,
            DealState::Funded | DealState::Paid | DealState::Disputed | DealState::Resolved
        )
    }
}

impl std::fmt::Display for DealState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DealState::Created => "created",
            DealState::Accepted => "accepted",
            DealState::Funded => "funded",
            DealState::Paid => "paid",
            DealState::Disputed => "disputed",
            DealState::Cancelled => "cancelled",
            DealState::Resolved => "resolved",
            DealState::Released => "released",
        };
        write!(f, "{}", s)
    }
}

/// The claim a disputed deal settles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Claim {
    /// The buyer did pay; custody goes to the buyer.
    Paid,
    /// The buyer did not pay; custody returns to the seller.
    NotPaid,
}

impl std::fmt::Display for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Claim::Paid => write!(f, "paid"),
            Claim::NotPaid => write!(f, "not_paid"),
        }
    }
}

/// A chat message attached to a deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: AccountId,
    pub body: String,
    pub at: Timestamp,
}

/// The escrow aggregate. Offer terms are snapshotted at creation so later
/// offer edits never change an open deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub offer_id: OfferId,
    pub owner: AccountId,
    pub taker: AccountId,
    pub is_sell: bool,
    pub asset: Asset,
    pub fiat: Fiat,
    pub method: PaymentMethod,
    pub rate: Rate,
    /// Escrowed asset amount, fixed at creation and never recomputed.
    pub token_amount: TokenAmount,
    pub fiat_amount: FiatAmount,
    pub terms: String,
    pub payment_instructions: String,
    pub state: DealState,
    /// Set when the assertion engine settles a dispute.
    pub resolved_claim: Option<Claim>,
    pub accept_deadline: Timestamp,
    /// Set at funding time; None before.
    pub payment_deadline: Option<Timestamp>,
    pub created_at: Timestamp,
    pub funded_at: Option<Timestamp>,
    pub paid_at: Option<Timestamp>,
    pub feedback_owner: bool,
    pub feedback_taker: bool,
    pub messages: Vec<ChatMessage>,
}

impl Deal {
    pub fn open(
        id: DealId,
        offer: &Offer,
        taker: AccountId,
        token_amount: TokenAmount,
        fiat_amount: FiatAmount,
        payment_instructions: String,
        created_at: Timestamp,
        accept_deadline: Timestamp,
    ) -> Self {
        Deal {
            id,
            offer_id: offer.id,
            owner: offer.owner.clone(),
            taker,
            is_sell: offer.is_sell,
            asset: offer.asset.clone(),
            fiat: offer.fiat.clone(),
            method: offer.method.clone(),
            rate: offer.rate,
            token_amount,
            fiat_amount,
            terms: offer.terms.clone(),
            payment_instructions,
            state: DealState::Created,
            resolved_claim: None,
            accept_deadline,
            payment_deadline: None,
            created_at,
            funded_at: None,
            paid_at: None,
            feedback_owner: false,
            feedback_taker: false,
            messages: Vec::new(),
        }
    }

    /// The party that escrows the asset.
    pub fn seller(&self) -> &AccountId {
        if self.is_sell {
            &self.owner
        } else {
            &self.taker
        }
    }

    /// The party that pays fiat and receives the asset.
    pub fn buyer(&self) -> &AccountId {
        if self.is_sell {
            &self.taker
        } else {
            &self.owner
        }
    }

    pub fn is_party(&self, account: &AccountId) -> bool {
        account == &self.owner || account == &self.taker
    }

    /// The other deal party, if `account` is one of them.
    pub fn counterparty(&self, account: &AccountId) -> Option<&AccountId> {
        if account == &self.owner {
            Some(&self.taker)
        } else if account == &self.taker {
            Some(&self.owner)
        } else {
            None
        }
    }
}
