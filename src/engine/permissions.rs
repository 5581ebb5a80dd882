//! Per-transition permission table, evaluated as pure data.
//!
//! Each rule names the source state, the action, the role that may invoke it,
//! a timing guard, and the target state. Authorization walks the table:
//! no rule for (state, action) is a state violation; a rule whose role never
//! matches the caller is a permission violation; a matching rule whose
//! deadline has not passed is a state violation naming the deadline. The two
//! error kinds stay distinguishable to callers.

use crate::domain::{AccountId, Claim, Deal, DealState, Timestamp};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DealAction {
    Accept,
    Fund,
    MarkPaid,
    Release,
    Dispute,
    Cancel,
}

impl std::fmt::Display for DealAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DealAction::Accept => "accept",
            DealAction::Fund => "fund",
            DealAction::MarkPaid => "paid",
            DealAction::Release => "release",
            DealAction::Dispute => "dispute",
            DealAction::Cancel => "cancel",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    OfferOwner,
    Taker,
    Seller,
    Buyer,
    EitherParty,
    Anyone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingGuard {
    Always,
    AfterAcceptDeadline,
    AfterPaymentDeadline,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub from: DealState,
    pub action: DealAction,
    pub role: Role,
    pub timing: TimingGuard,
    /// Required settled claim, for transitions out of `Resolved`.
    pub claim: Option<Claim>,
    pub to: DealState,
}

const fn rule(
    from: DealState,
    action: DealAction,
    role: Role,
    timing: TimingGuard,
    to: DealState,
) -> Rule {
    Rule {
        from,
        action,
        role,
        timing,
        claim: None,
        to,
    }
}

pub const RULES: &[Rule] = &[
    rule(
        DealState::Created,
        DealAction::Accept,
        Role::OfferOwner,
        TimingGuard::Always,
        DealState::Accepted,
    ),
    rule(
        DealState::Created,
        DealAction::Cancel,
        Role::Taker,
        TimingGuard::Always,
        DealState::Cancelled,
    ),
    rule(
        DealState::Created,
        DealAction::Cancel,
        Role::Anyone,
        TimingGuard::AfterAcceptDeadline,
        DealState::Cancelled,
    ),
    rule(
        DealState::Accepted,
        DealAction::Fund,
        Role::Seller,
        TimingGuard::Always,
        DealState::Funded,
    ),
    // The seller cannot back out once accepted; the buying party may.
    rule(
        DealState::Accepted,
        DealAction::Cancel,
        Role::Buyer,
        TimingGuard::Always,
        DealState::Cancelled,
    ),
    rule(
        DealState::Accepted,
        DealAction::Cancel,
        Role::Anyone,
        TimingGuard::AfterAcceptDeadline,
        DealState::Cancelled,
    ),
    rule(
        DealState::Funded,
        DealAction::MarkPaid,
        Role::Buyer,
        TimingGuard::Always,
        DealState::Paid,
    ),
    rule(
        DealState::Funded,
        DealAction::Cancel,
        Role::Buyer,
        TimingGuard::Always,
        DealState::Cancelled,
    ),
    rule(
        DealState::Funded,
        DealAction::Cancel,
        Role::Seller,
        TimingGuard::AfterPaymentDeadline,
        DealState::Cancelled,
    ),
    rule(
        DealState::Paid,
        DealAction::Release,
        Role::Seller,
        TimingGuard::Always,
        DealState::Released,
    ),
    rule(
        DealState::Paid,
        DealAction::Dispute,
        Role::EitherParty,
        TimingGuard::Always,
        DealState::Disputed,
    ),
    Rule {
        from: DealState::Resolved,
        action: DealAction::Release,
        role: Role::EitherParty,
        timing: TimingGuard::Always,
        claim: Some(Claim::Paid),
        to: DealState::Released,
    },
    Rule {
        from: DealState::Resolved,
        action: DealAction::Cancel,
        role: Role::EitherParty,
        timing: TimingGuard::Always,
        claim: Some(Claim::NotPaid),
        to: DealState::Cancelled,
    },
];

fn role_matches(role: Role, deal: &Deal, caller: &AccountId) -> bool {
    match role {
        Role::OfferOwner => caller == &deal.owner,
        Role::Taker => caller == &deal.taker,
        Role::Seller => caller == deal.seller(),
        Role::Buyer => caller == deal.buyer(),
        Role::EitherParty => deal.is_party(caller),
        Role::Anyone => true,
    }
}

fn timing_open(timing: TimingGuard, deal: &Deal, now: Timestamp) -> bool {
    match timing {
        TimingGuard::Always => true,
        TimingGuard::AfterAcceptDeadline => now >= deal.accept_deadline,
        TimingGuard::AfterPaymentDeadline => {
            deal.payment_deadline.is_some_and(|d| now >= d)
        }
    }
}

/// Authorize `action` on `deal` by `caller` at `now`; returns the target state.
pub fn authorize(
    deal: &Deal,
    action: DealAction,
    caller: &AccountId,
    now: Timestamp,
) -> Result<DealState, EngineError> {
    let candidates: Vec<&Rule> = RULES
        .iter()
        .filter(|r| {
            r.from == deal.state
                && r.action == action
                && (r.claim.is_none() || r.claim == deal.resolved_claim)
        })
        .collect();

    if candidates.is_empty() {
        return Err(EngineError::InvalidState(format!(
            "cannot {} a deal in state {}",
            action, deal.state
        )));
    }

    let eligible: Vec<&Rule> = candidates
        .iter()
        .copied()
        .filter(|r| role_matches(r.role, deal, caller))
        .collect();

    if eligible.is_empty() {
        return Err(EngineError::Unauthorized(format!(
            "{} may not {} this deal",
            caller, action
        )));
    }

    match eligible.iter().find(|r| timing_open(r.timing, deal, now)) {
        Some(r) => Ok(r.to),
        None => Err(EngineError::InvalidState(format!(
            "{} deadline has not passed yet",
            action
        ))),
    }
}
