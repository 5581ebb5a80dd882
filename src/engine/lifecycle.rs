//! The deal lifecycle engine: guards, custody movement, and settlement
//! side effects, serialized per aggregate.
//!
//! Each deal lives behind its own mutex; a transition locks the deal, walks
//! the permission table, and only then mutates. Racing callers are resolved
//! by guard re-evaluation under the lock: exactly one mutates, every other
//! attempt observes the changed state and fails. There are no await points
//! inside a transition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::info;

use crate::domain::{
    AccountId, Assertion, Asset, Claim, Deal, DealId, DealState, Fiat, FiatAmount, MarketRate,
    Offer, OfferId, PaymentMethod, Profile, ProfileId, Rate, Timestamp,
};
use crate::error::EngineError;

use super::assertions::AssertionBook;
use super::fees::{fee_for, FeeCollector};
use super::permissions::{authorize, DealAction};
use super::pricing;
use super::reputation::ReputationLedger;
use super::vault::Vault;
use super::{DealEvent, EngineParams};

/// Parameters for opening a new offer.
#[derive(Debug, Clone)]
pub struct NewOffer {
    pub is_sell: bool,
    pub asset: String,
    pub fiat: String,
    pub method: String,
    /// Margin percent over market; stored as `floor((1 + r/100) × 10_000)`.
    pub margin_percent: i64,
    pub min_fiat: FiatAmount,
    pub max_fiat: FiatAmount,
    pub terms: String,
}

/// Snapshot of the mutated deal plus the change notifications it emitted.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub deal: Deal,
    pub events: Vec<DealEvent>,
}

pub struct DealEngine {
    params: EngineParams,
    offers: RwLock<HashMap<OfferId, Arc<Mutex<Offer>>>>,
    deals: RwLock<HashMap<DealId, Arc<Mutex<Deal>>>>,
    vault: Mutex<Vault>,
    assertions: Mutex<AssertionBook>,
    reputation: Mutex<ReputationLedger>,
    fees: Arc<dyn FeeCollector>,
}

impl DealEngine {
    pub fn new(params: EngineParams, fees: Arc<dyn FeeCollector>) -> Self {
        DealEngine {
            params,
            offers: RwLock::new(HashMap::new()),
            deals: RwLock::new(HashMap::new()),
            vault: Mutex::new(Vault::new()),
            assertions: Mutex::new(AssertionBook::new()),
            reputation: Mutex::new(ReputationLedger::new()),
            fees,
        }
    }

    // ---- offers ----

    pub fn create_offer(&self, owner: &AccountId, new: NewOffer) -> Result<Offer, EngineError> {
        if !self.params.assets.contains_key(&new.asset) {
            return Err(EngineError::InvalidInput(format!(
                "asset {} is not whitelisted",
                new.asset
            )));
        }
        if !self.params.fiats.contains(&new.fiat) {
            return Err(EngineError::InvalidInput(format!(
                "fiat {} is not whitelisted",
                new.fiat
            )));
        }
        if !self.params.methods.contains(&new.method) {
            return Err(EngineError::InvalidInput(format!(
                "payment method {} is not whitelisted",
                new.method
            )));
        }
        let rate = Rate::from_margin_percent(new.margin_percent).ok_or_else(|| {
            EngineError::InvalidInput("margin yields a non-positive rate".into())
        })?;

        let offer = Offer::new(
            OfferId::new(),
            owner.clone(),
            new.is_sell,
            Asset::new(new.asset),
            Fiat::new(new.fiat),
            PaymentMethod::new(new.method),
            rate,
            new.min_fiat,
            new.max_fiat,
            new.terms,
        )?;

        info!(offer = %offer.id, owner = %owner, "offer created");
        self.offers
            .write()
            .expect("offers lock poisoned")
            .insert(offer.id, Arc::new(Mutex::new(offer.clone())));
        Ok(offer)
    }

    pub fn offer(&self, id: OfferId) -> Result<Offer, EngineError> {
        let arc = self.offer_arc(id)?;
        let offer = arc.lock().expect("offer lock poisoned");
        Ok(offer.clone())
    }

    pub fn set_offer_rate(
        &self,
        caller: &AccountId,
        id: OfferId,
        margin_percent: i64,
    ) -> Result<Offer, EngineError> {
        let rate = Rate::from_margin_percent(margin_percent).ok_or_else(|| {
            EngineError::InvalidInput("margin yields a non-positive rate".into())
        })?;
        self.with_offer(id, |offer| {
            offer.set_rate(caller, rate)?;
            Ok(offer.clone())
        })
    }

    pub fn set_offer_limits(
        &self,
        caller: &AccountId,
        id: OfferId,
        min_fiat: FiatAmount,
        max_fiat: FiatAmount,
    ) -> Result<Offer, EngineError> {
        self.with_offer(id, |offer| {
            offer.set_limits(caller, min_fiat, max_fiat)?;
            Ok(offer.clone())
        })
    }

    pub fn set_offer_terms(
        &self,
        caller: &AccountId,
        id: OfferId,
        terms: String,
    ) -> Result<Offer, EngineError> {
        self.with_offer(id, |offer| {
            offer.set_terms(caller, terms)?;
            Ok(offer.clone())
        })
    }

    pub fn set_offer_disabled(
        &self,
        caller: &AccountId,
        id: OfferId,
        disabled: bool,
    ) -> Result<Offer, EngineError> {
        self.with_offer(id, |offer| {
            offer.set_disabled(caller, disabled)?;
            Ok(offer.clone())
        })
    }

    // ---- vault ----

    /// Credit an account's asset balance. Stands in for wallet connectivity,
    /// which is an external collaborator.
    pub fn deposit(
        &self,
        account: &AccountId,
        asset: &Asset,
        amount: u128,
    ) -> Result<u128, EngineError> {
        if !self.params.assets.contains_key(asset.as_str()) {
            return Err(EngineError::InvalidInput(format!(
                "asset {} is not whitelisted",
                asset
            )));
        }
        let mut vault = self.vault.lock().expect("vault lock poisoned");
        vault.credit(account, asset, amount);
        Ok(vault.balance_of(account, asset))
    }

    pub fn deposit_collateral(&self, account: &AccountId, amount: u128) -> u128 {
        let mut vault = self.vault.lock().expect("vault lock poisoned");
        vault.credit_collateral(account, amount);
        vault.collateral_of(account)
    }

    pub fn balance_of(&self, account: &AccountId, asset: &Asset) -> u128 {
        self.vault
            .lock()
            .expect("vault lock poisoned")
            .balance_of(account, asset)
    }

    pub fn collateral_of(&self, account: &AccountId) -> u128 {
        self.vault
            .lock()
            .expect("vault lock poisoned")
            .collateral_of(account)
    }

    /// Asset currently held in custody for a deal.
    pub fn custody_of(&self, deal: DealId) -> u128 {
        self.vault
            .lock()
            .expect("vault lock poisoned")
            .escrow_of(deal)
    }

    // ---- deal lifecycle ----

    /// Open a deal against a live offer. The market rate is consumed exactly
    /// once, here; the resulting token amount is never recomputed.
    pub fn create_deal(
        &self,
        taker: &AccountId,
        offer_id: OfferId,
        fiat_amount: FiatAmount,
        payment_instructions: String,
        market: MarketRate,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EngineError> {
        let offer = self.offer(offer_id)?;
        if offer.disabled {
            return Err(EngineError::InvalidState("offer is disabled".into()));
        }
        if taker == &offer.owner {
            return Err(EngineError::InvalidInput(
                "offer owner cannot take their own offer".into(),
            ));
        }
        if !offer.accepts_amount(fiat_amount) {
            return Err(EngineError::InvalidInput(format!(
                "fiat amount {} outside offer limits [{}, {}]",
                fiat_amount.as_micros(),
                offer.min_fiat.as_micros(),
                offer.max_fiat.as_micros()
            )));
        }

        let decimals = self
            .params
            .assets
            .get(offer.asset.as_str())
            .copied()
            .ok_or_else(|| {
                EngineError::InvalidInput(format!("asset {} is not whitelisted", offer.asset))
            })?;
        let token_amount = pricing::token_amount_for(fiat_amount, offer.rate, market, decimals)?;
        if token_amount.is_zero() {
            return Err(EngineError::InvalidInput(
                "fiat amount converts to zero asset units".into(),
            ));
        }
        // Rounding down the escrow must not drop its value under the offer's
        // floor, or the escrow would be under-collateralized.
        let escrow_value = pricing::fiat_value(token_amount, market, decimals)?;
        if escrow_value < offer.min_fiat {
            return Err(EngineError::InvalidInput(
                "escrow value falls below the offer minimum".into(),
            ));
        }

        let deal = Deal::open(
            DealId::new(),
            &offer,
            taker.clone(),
            token_amount,
            fiat_amount,
            payment_instructions,
            now,
            now.plus(self.params.accept_window_secs),
        );
        info!(deal = %deal.id, offer = %offer.id, taker = %taker, "deal created");

        let outcome = TransitionOutcome {
            events: vec![DealEvent::StateChanged {
                deal: deal.id,
                state: DealState::Created,
                actor: taker.clone(),
            }],
            deal: deal.clone(),
        };
        self.deals
            .write()
            .expect("deals lock poisoned")
            .insert(deal.id, Arc::new(Mutex::new(deal)));
        Ok(outcome)
    }

    pub fn deal(&self, id: DealId) -> Result<Deal, EngineError> {
        let arc = self.deal_arc(id)?;
        let deal = arc.lock().expect("deal lock poisoned");
        Ok(deal.clone())
    }

    pub fn accept(
        &self,
        caller: &AccountId,
        id: DealId,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EngineError> {
        let arc = self.deal_arc(id)?;
        let mut deal = arc.lock().expect("deal lock poisoned");
        let target = authorize(&deal, DealAction::Accept, caller, now)?;
        deal.state = target;
        info!(deal = %deal.id, actor = %caller, "deal accepted");
        Ok(Self::state_outcome(&deal, caller))
    }

    /// Move the token amount into custody. Fails with `InsufficientFunds` if
    /// the seller's vault balance cannot cover it, leaving the deal untouched.
    pub fn fund(
        &self,
        caller: &AccountId,
        id: DealId,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EngineError> {
        let arc = self.deal_arc(id)?;
        let mut deal = arc.lock().expect("deal lock poisoned");
        let target = authorize(&deal, DealAction::Fund, caller, now)?;

        {
            let mut vault = self.vault.lock().expect("vault lock poisoned");
            vault.fund_escrow(
                deal.id,
                deal.seller(),
                &deal.asset,
                deal.token_amount.as_base_units(),
            )?;
        }

        deal.state = target;
        deal.funded_at = Some(now);
        deal.payment_deadline = Some(now.plus(self.params.payment_window_secs));
        info!(deal = %deal.id, actor = %caller, "deal funded");
        Ok(Self::state_outcome(&deal, caller))
    }

    pub fn mark_paid(
        &self,
        caller: &AccountId,
        id: DealId,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EngineError> {
        let arc = self.deal_arc(id)?;
        let mut deal = arc.lock().expect("deal lock poisoned");
        let target = authorize(&deal, DealAction::MarkPaid, caller, now)?;
        deal.state = target;
        deal.paid_at = Some(now);
        info!(deal = %deal.id, actor = %caller, "payment claimed");
        Ok(Self::state_outcome(&deal, caller))
    }

    pub fn dispute(
        &self,
        caller: &AccountId,
        id: DealId,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EngineError> {
        let arc = self.deal_arc(id)?;
        let mut deal = arc.lock().expect("deal lock poisoned");
        let target = authorize(&deal, DealAction::Dispute, caller, now)?;
        deal.state = target;
        info!(deal = %deal.id, actor = %caller, "deal disputed");
        Ok(Self::state_outcome(&deal, caller))
    }

    /// Settle custody to the buyer, minus the protocol fee. Legal from `Paid`
    /// (seller only) and from `Resolved` with a settled `Paid` claim (either
    /// party), in which case the seller also loses the dispute.
    pub fn release(
        &self,
        caller: &AccountId,
        id: DealId,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EngineError> {
        let arc = self.deal_arc(id)?;
        let mut deal = arc.lock().expect("deal lock poisoned");
        let target = authorize(&deal, DealAction::Release, caller, now)?;
        let from_resolved = deal.state == DealState::Resolved;

        let total = deal.token_amount.as_base_units();
        let fee = fee_for(total, self.params.fee_bps);
        // The fee collector may refuse; nothing has been mutated yet.
        self.fees.collect(&deal.asset, fee)?;

        {
            let mut vault = self.vault.lock().expect("vault lock poisoned");
            let escrow = vault.drain_escrow(deal.id);
            debug_assert_eq!(escrow, total);
            vault.credit(deal.buyer(), &deal.asset, escrow - fee);
        }

        {
            let mut rep = self.reputation.lock().expect("reputation lock poisoned");
            let seller = deal.seller().clone();
            let buyer = deal.buyer().clone();
            rep.record_completed(&seller);
            rep.record_completed(&buyer);
            rep.record_volume(&seller, deal.fiat_amount);
            rep.record_volume(&buyer, deal.fiat_amount);
            if let (Some(funded), Some(paid)) = (deal.funded_at, deal.paid_at) {
                rep.record_payment_time(&buyer, paid.since(funded) as u64);
            }
            if let Some(paid) = deal.paid_at {
                rep.record_release_time(&seller, now.since(paid) as u64);
            }
            if from_resolved {
                rep.record_dispute_lost(&seller);
            }
        }

        deal.state = target;
        info!(deal = %deal.id, actor = %caller, fee, "custody released to buyer");
        Ok(Self::state_outcome(&deal, caller))
    }

    /// Cancel a deal. Refunds custody to the seller when any is held; counts
    /// an expiry against the stalled party when the relevant deadline has
    /// passed; counts a lost dispute against the buyer when cancelling a
    /// `Resolved(NotPaid)` deal.
    pub fn cancel(
        &self,
        caller: &AccountId,
        id: DealId,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EngineError> {
        let arc = self.deal_arc(id)?;
        let mut deal = arc.lock().expect("deal lock poisoned");
        let target = authorize(&deal, DealAction::Cancel, caller, now)?;

        {
            let mut rep = self.reputation.lock().expect("reputation lock poisoned");
            match deal.state {
                DealState::Created if now >= deal.accept_deadline => {
                    rep.record_expired(&deal.owner);
                }
                DealState::Accepted if now >= deal.accept_deadline => {
                    rep.record_expired(deal.seller());
                }
                DealState::Funded if deal.payment_deadline.is_some_and(|d| now >= d) => {
                    rep.record_expired(deal.buyer());
                }
                DealState::Resolved => {
                    rep.record_dispute_lost(deal.buyer());
                }
                _ => {}
            }
        }

        if deal.state.holds_custody() {
            let mut vault = self.vault.lock().expect("vault lock poisoned");
            let escrow = vault.drain_escrow(deal.id);
            vault.credit(deal.seller(), &deal.asset, escrow);
        }

        deal.state = target;
        info!(deal = %deal.id, actor = %caller, "deal cancelled");
        Ok(Self::state_outcome(&deal, caller))
    }

    pub fn message(
        &self,
        caller: &AccountId,
        id: DealId,
        body: String,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EngineError> {
        if body.is_empty() {
            return Err(EngineError::InvalidInput("empty message".into()));
        }
        let arc = self.deal_arc(id)?;
        let mut deal = arc.lock().expect("deal lock poisoned");
        if !deal.is_party(caller) {
            return Err(EngineError::Unauthorized(
                "only deal parties may message".into(),
            ));
        }
        if deal.state.is_terminal() {
            return Err(EngineError::InvalidState(
                "deal is settled; no further messages".into(),
            ));
        }
        deal.messages.push(crate::domain::ChatMessage {
            sender: caller.clone(),
            body: body.clone(),
            at: now,
        });
        Ok(TransitionOutcome {
            events: vec![DealEvent::Message {
                deal: deal.id,
                sender: caller.clone(),
                body,
            }],
            deal: deal.clone(),
        })
    }

    /// One feedback per party, only after settlement; updates the
    /// counterparty's reputation counters.
    pub fn feedback(
        &self,
        caller: &AccountId,
        id: DealId,
        upvote: bool,
        message: String,
    ) -> Result<TransitionOutcome, EngineError> {
        let arc = self.deal_arc(id)?;
        let mut deal = arc.lock().expect("deal lock poisoned");
        let counterparty = deal
            .counterparty(caller)
            .ok_or_else(|| {
                EngineError::Unauthorized("only deal parties may leave feedback".into())
            })?
            .clone();
        if !deal.state.is_terminal() {
            return Err(EngineError::InvalidState(
                "feedback is only allowed after settlement".into(),
            ));
        }
        let flag = if caller == &deal.owner {
            &mut deal.feedback_owner
        } else {
            &mut deal.feedback_taker
        };
        if *flag {
            return Err(EngineError::DuplicateFeedback);
        }
        *flag = true;

        self.reputation
            .lock()
            .expect("reputation lock poisoned")
            .apply_feedback(&counterparty, upvote);

        Ok(TransitionOutcome {
            events: vec![DealEvent::FeedbackGiven {
                deal: deal.id,
                to: counterparty,
                upvote,
                message,
            }],
            deal: deal.clone(),
        })
    }

    // ---- dispute resolution ----

    /// Bond a claim about a disputed deal's true payment status. The bond is
    /// drawn from the asserter's collateral and must meet the protocol
    /// threshold unless the asserter is a configured steward.
    pub fn assert_claim(
        &self,
        caller: &AccountId,
        id: DealId,
        claim: Claim,
        bond: u128,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EngineError> {
        let arc = self.deal_arc(id)?;
        let deal = arc.lock().expect("deal lock poisoned");
        if deal.state != DealState::Disputed {
            return Err(EngineError::InvalidState(
                "claims may only be asserted on a disputed deal".into(),
            ));
        }
        if !self.params.stewards.contains(caller) && bond < self.params.assertion_bond_min {
            return Err(EngineError::InvalidInput(format!(
                "bond {} below the protocol threshold {}",
                bond, self.params.assertion_bond_min
            )));
        }

        let mut book = self.assertions.lock().expect("assertion lock poisoned");
        if book.get(deal.id).is_some() {
            return Err(EngineError::DuplicateAssertion);
        }
        self.vault
            .lock()
            .expect("vault lock poisoned")
            .lock_bond(deal.id, caller, bond)?;
        book.post(Assertion::new(
            deal.id,
            claim,
            bond,
            caller.clone(),
            now.plus(self.params.assertion_liveness_secs),
        ))?;

        info!(deal = %deal.id, asserter = %caller, %claim, bond, "claim asserted");
        Ok(TransitionOutcome {
            events: vec![DealEvent::ClaimAsserted {
                deal: deal.id,
                claim,
                asserter: caller.clone(),
                bond,
            }],
            deal: deal.clone(),
        })
    }

    /// Void the live assertion before its liveness deadline, reopening the
    /// dispute. Open to the deal parties and to any collateral holder.
    pub fn challenge(
        &self,
        caller: &AccountId,
        id: DealId,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EngineError> {
        let arc = self.deal_arc(id)?;
        let deal = arc.lock().expect("deal lock poisoned");
        if deal.state != DealState::Disputed {
            return Err(EngineError::InvalidState(
                "no dispute is open for this deal".into(),
            ));
        }
        let holds_collateral = self
            .vault
            .lock()
            .expect("vault lock poisoned")
            .collateral_of(caller)
            > 0;
        if !deal.is_party(caller) && !holds_collateral {
            return Err(EngineError::Unauthorized(
                "challenges require a deal party or a collateral holder".into(),
            ));
        }

        self.assertions
            .lock()
            .expect("assertion lock poisoned")
            .challenge(deal.id, now)?;
        self.vault
            .lock()
            .expect("vault lock poisoned")
            .release_bond(deal.id);

        info!(deal = %deal.id, challenger = %caller, "assertion challenged");
        Ok(TransitionOutcome {
            events: vec![DealEvent::ClaimChallenged {
                deal: deal.id,
                challenger: caller.clone(),
            }],
            deal: deal.clone(),
        })
    }

    /// External trigger performing the lazy liveness check: consumes an
    /// unchallenged assertion past its deadline and moves the deal to
    /// `Resolved(claim)`. Callable by anyone.
    pub fn settle(&self, id: DealId, now: Timestamp) -> Result<TransitionOutcome, EngineError> {
        let arc = self.deal_arc(id)?;
        let mut deal = arc.lock().expect("deal lock poisoned");
        if deal.state != DealState::Disputed {
            return Err(EngineError::InvalidState(
                "only a disputed deal can settle an assertion".into(),
            ));
        }

        let assertion = self
            .assertions
            .lock()
            .expect("assertion lock poisoned")
            .take_settleable(deal.id, now)?;
        self.vault
            .lock()
            .expect("vault lock poisoned")
            .release_bond(deal.id);

        deal.resolved_claim = Some(assertion.claim);
        deal.state = DealState::Resolved;
        info!(deal = %deal.id, claim = %assertion.claim, "dispute resolved");
        Ok(Self::state_outcome(&deal, &assertion.asserter))
    }

    pub fn live_assertion(&self, id: DealId) -> Option<Assertion> {
        self.assertions
            .lock()
            .expect("assertion lock poisoned")
            .get(id)
            .cloned()
    }

    // ---- reputation ----

    pub fn register_profile(&self, owner: &AccountId, now: Timestamp) -> Profile {
        self.reputation
            .lock()
            .expect("reputation lock poisoned")
            .register(owner, now)
    }

    pub fn merge_profiles(
        &self,
        caller: &AccountId,
        into: ProfileId,
        from: ProfileId,
    ) -> Result<Profile, EngineError> {
        self.reputation
            .lock()
            .expect("reputation lock poisoned")
            .merge(caller, into, from)
    }

    pub fn profile(&self, id: ProfileId) -> Result<Profile, EngineError> {
        self.reputation
            .lock()
            .expect("reputation lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn primary_profile(&self, owner: &AccountId) -> Option<Profile> {
        self.reputation
            .lock()
            .expect("reputation lock poisoned")
            .primary_of(owner)
            .cloned()
    }

    // ---- helpers ----

    fn state_outcome(deal: &Deal, actor: &AccountId) -> TransitionOutcome {
        TransitionOutcome {
            events: vec![DealEvent::StateChanged {
                deal: deal.id,
                state: deal.state,
                actor: actor.clone(),
            }],
            deal: deal.clone(),
        }
    }

    fn offer_arc(&self, id: OfferId) -> Result<Arc<Mutex<Offer>>, EngineError> {
        self.offers
            .read()
            .expect("offers lock poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("offer {}", id)))
    }

    fn deal_arc(&self, id: DealId) -> Result<Arc<Mutex<Deal>>, EngineError> {
        self.deals
            .read()
            .expect("deals lock poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("deal {}", id)))
    }

    fn with_offer<T>(
        &self,
        id: OfferId,
        f: impl FnOnce(&mut Offer) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let arc = self.offer_arc(id)?;
        let mut offer = arc.lock().expect("offer lock poisoned");
        f(&mut offer)
    }
}
