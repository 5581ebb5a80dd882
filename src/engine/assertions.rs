//! Book of live truth assertions, one per disputed deal at most.
//!
//! The book only tracks claims and their liveness windows; bonding collateral
//! and moving the deal out of `Disputed` belong to the lifecycle engine.

use std::collections::HashMap;

use crate::domain::{Assertion, DealId, Timestamp};
use crate::error::EngineError;

#[derive(Debug, Default)]
pub struct AssertionBook {
    live: HashMap<DealId, Assertion>,
}

impl AssertionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a new assertion. A second live assertion for the same deal fails.
    pub fn post(&mut self, assertion: Assertion) -> Result<(), EngineError> {
        if self.live.contains_key(&assertion.deal) {
            return Err(EngineError::DuplicateAssertion);
        }
        self.live.insert(assertion.deal, assertion);
        Ok(())
    }

    pub fn get(&self, deal: DealId) -> Option<&Assertion> {
        self.live.get(&deal)
    }

    /// Void the live assertion before its deadline. Returns the discarded
    /// assertion so the caller can return its bond.
    pub fn challenge(&mut self, deal: DealId, now: Timestamp) -> Result<Assertion, EngineError> {
        let assertion = self
            .live
            .get(&deal)
            .ok_or_else(|| EngineError::NotFound(format!("no live assertion for deal {}", deal)))?;
        if now >= assertion.deadline {
            return Err(EngineError::InvalidState(
                "liveness window already elapsed; the claim is settleable".into(),
            ));
        }
        let mut assertion = self
            .live
            .remove(&deal)
            .expect("assertion checked above");
        assertion.challenged = true;
        Ok(assertion)
    }

    /// Consume the live assertion once its liveness window has elapsed
    /// unchallenged. Before the deadline this fails with a guard error.
    pub fn take_settleable(
        &mut self,
        deal: DealId,
        now: Timestamp,
    ) -> Result<Assertion, EngineError> {
        let assertion = self
            .live
            .get(&deal)
            .ok_or_else(|| EngineError::NotFound(format!("no live assertion for deal {}", deal)))?;
        if !assertion.is_settleable(now) {
            return Err(EngineError::InvalidState(
                "assertion liveness window has not elapsed".into(),
            ));
        }
        Ok(self.live.remove(&deal).expect("assertion checked above"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, Claim};

    fn assertion(deal: DealId, deadline: i64) -> Assertion {
        Assertion::new(
            deal,
            Claim::NotPaid,
            1_000,
            AccountId::new("asserter"),
            Timestamp::new(deadline),
        )
    }

    #[test]
    fn test_second_post_rejected() {
        let mut book = AssertionBook::new();
        let deal = DealId::new();
        book.post(assertion(deal, 100)).unwrap();
        assert!(matches!(
            book.post(assertion(deal, 200)),
            Err(EngineError::DuplicateAssertion)
        ));
    }

    #[test]
    fn test_settle_respects_liveness() {
        let mut book = AssertionBook::new();
        let deal = DealId::new();
        book.post(assertion(deal, 100)).unwrap();

        assert!(matches!(
            book.take_settleable(deal, Timestamp::new(99)),
            Err(EngineError::InvalidState(_))
        ));
        let settled = book.take_settleable(deal, Timestamp::new(100)).unwrap();
        assert_eq!(settled.claim, Claim::NotPaid);
        // Consumed: a second settle finds nothing.
        assert!(matches!(
            book.take_settleable(deal, Timestamp::new(101)),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_challenge_voids_and_reopens() {
        let mut book = AssertionBook::new();
        let deal = DealId::new();
        book.post(assertion(deal, 100)).unwrap();

        let voided = book.challenge(deal, Timestamp::new(50)).unwrap();
        assert!(voided.challenged);
        // A fresh assertion may now be posted.
        book.post(assertion(deal, 300)).unwrap();
    }

    #[test]
    fn test_challenge_too_late() {
        let mut book = AssertionBook::new();
        let deal = DealId::new();
        book.post(assertion(deal, 100)).unwrap();
        assert!(matches!(
            book.challenge(deal, Timestamp::new(100)),
            Err(EngineError::InvalidState(_))
        ));
    }
}
