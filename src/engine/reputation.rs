//! Reputation ledger: an arena of profiles keyed by opaque id.
//!
//! Registration always mints a fresh profile; a participant with several
//! profiles folds them together with `merge`. Side-effect hooks invoked by
//! deal settlement target the owner's primary profile and no-op silently for
//! unregistered parties.

use std::collections::HashMap;

use crate::domain::{AccountId, FiatAmount, Profile, ProfileId, Timestamp};
use crate::error::EngineError;

#[derive(Debug, Default)]
pub struct ReputationLedger {
    profiles: HashMap<ProfileId, Profile>,
    primary: HashMap<AccountId, ProfileId>,
}

impl ReputationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new profile for `owner`. The first profile (or a later merge
    /// target) becomes the owner's primary.
    pub fn register(&mut self, owner: &AccountId, now: Timestamp) -> Profile {
        let profile = Profile::new(ProfileId::new(), owner.clone(), now);
        self.primary.entry(owner.clone()).or_insert(profile.id);
        self.profiles.insert(profile.id, profile.clone());
        profile
    }

    pub fn get(&self, id: ProfileId) -> Result<&Profile, EngineError> {
        self.profiles
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(format!("profile {}", id)))
    }

    pub fn primary_of(&self, owner: &AccountId) -> Option<&Profile> {
        self.primary.get(owner).and_then(|id| self.profiles.get(id))
    }

    /// Sum all counters of `from` into `into` and retire `from`. Both must be
    /// owned by `caller`; merge is one-directional and destroys the source.
    pub fn merge(
        &mut self,
        caller: &AccountId,
        into: ProfileId,
        from: ProfileId,
    ) -> Result<Profile, EngineError> {
        if into == from {
            return Err(EngineError::InvalidInput(
                "cannot merge a profile into itself".into(),
            ));
        }
        let target_owner = self.get(into)?.owner.clone();
        let source_owner = self.get(from)?.owner.clone();
        if &target_owner != caller || &source_owner != caller {
            return Err(EngineError::Unauthorized(
                "merge requires the common owner of both profiles".into(),
            ));
        }

        let source = self
            .profiles
            .remove(&from)
            .ok_or_else(|| EngineError::NotFound(format!("profile {}", from)))?;
        let target = self
            .profiles
            .get_mut(&into)
            .ok_or_else(|| EngineError::NotFound(format!("profile {}", into)))?;
        target.absorb(&source);
        let merged = target.clone();
        self.primary.insert(caller.clone(), into);
        Ok(merged)
    }

    fn with_primary(&mut self, owner: &AccountId, update: impl FnOnce(&mut Profile)) {
        let Some(id) = self.primary.get(owner).copied() else {
            tracing::debug!(owner = %owner, "reputation hook skipped: no profile");
            return;
        };
        if let Some(profile) = self.profiles.get_mut(&id) {
            update(profile);
        }
    }

    pub fn record_completed(&mut self, owner: &AccountId) {
        self.with_primary(owner, |p| p.deals_completed += 1);
    }

    pub fn record_expired(&mut self, owner: &AccountId) {
        self.with_primary(owner, |p| p.deals_expired += 1);
    }

    pub fn record_dispute_lost(&mut self, owner: &AccountId) {
        self.with_primary(owner, |p| p.disputes_lost += 1);
    }

    pub fn record_volume(&mut self, owner: &AccountId, amount: FiatAmount) {
        self.with_primary(owner, |p| p.record_volume(amount));
    }

    pub fn record_payment_time(&mut self, owner: &AccountId, secs: u64) {
        self.with_primary(owner, |p| p.record_payment_time(secs));
    }

    pub fn record_release_time(&mut self, owner: &AccountId, secs: u64) {
        self.with_primary(owner, |p| p.record_release_time(secs));
    }

    /// Apply feedback counters to the counterparty's primary profile.
    pub fn apply_feedback(&mut self, to: &AccountId, upvote: bool) {
        self.with_primary(to, |p| {
            if upvote {
                p.upvotes += 1;
            } else {
                p.downvotes += 1;
            }
        });
    }
}
