//! Bonded, time-windowed claims about a disputed deal's true payment status.

use serde::{Deserialize, Serialize};

use super::deal::Claim;
use super::primitives::{AccountId, DealId, Timestamp};

/// A live assertion. At most one exists per disputed deal; it settles
/// automatically once its liveness deadline passes unchallenged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub deal: DealId,
    pub claim: Claim,
    /// Collateral bonded behind the claim.
    pub bond: u128,
    pub asserter: AccountId,
    /// End of the liveness window; checked lazily by `settle`.
    pub deadline: Timestamp,
    pub challenged: bool,
}

impl Assertion {
    pub fn new(
        deal: DealId,
        claim: Claim,
        bond: u128,
        asserter: AccountId,
        deadline: Timestamp,
    ) -> Self {
        Assertion {
            deal,
            claim,
            bond,
            asserter,
            deadline,
            challenged: false,
        }
    }

    /// Whether the claim may settle at `now`.
    pub fn is_settleable(&self, now: Timestamp) -> bool {
        !self.challenged && now >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settleable_only_past_deadline_unchallenged() {
        let mut a = Assertion::new(
            DealId::new(),
            Claim::NotPaid,
            1_000,
            AccountId::new("asserter"),
            Timestamp::new(500),
        );
        assert!(!a.is_settleable(Timestamp::new(499)));
        assert!(a.is_settleable(Timestamp::new(500)));
        a.challenged = true;
        assert!(!a.is_settleable(Timestamp::new(501)));
    }
}
