//! Per-participant reputation and trading-statistics record.

use serde::{Deserialize, Serialize};

use super::primitives::{AccountId, FiatAmount, ProfileId, Timestamp};

/// Aggregate statistics for one participant. Every field is a monotone
/// accumulator; averages are derived from (total, samples) pairs so merges
/// stay a plain sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub owner: AccountId,
    pub created_at: Timestamp,
    pub upvotes: u64,
    pub downvotes: u64,
    /// Settled volume in fiat micros.
    pub volume: u64,
    pub deals_completed: u64,
    pub deals_expired: u64,
    pub disputes_lost: u64,
    pub payment_time_total_secs: u64,
    pub payment_time_samples: u64,
    pub release_time_total_secs: u64,
    pub release_time_samples: u64,
}

impl Profile {
    pub fn new(id: ProfileId, owner: AccountId, created_at: Timestamp) -> Self {
        Profile {
            id,
            owner,
            created_at,
            upvotes: 0,
            downvotes: 0,
            volume: 0,
            deals_completed: 0,
            deals_expired: 0,
            disputes_lost: 0,
            payment_time_total_secs: 0,
            payment_time_samples: 0,
            release_time_total_secs: 0,
            release_time_samples: 0,
        }
    }

    pub fn avg_payment_time_secs(&self) -> Option<u64> {
        (self.payment_time_samples > 0)
            .then(|| self.payment_time_total_secs / self.payment_time_samples)
    }

    pub fn avg_release_time_secs(&self) -> Option<u64> {
        (self.release_time_samples > 0)
            .then(|| self.release_time_total_secs / self.release_time_samples)
    }

    pub fn record_volume(&mut self, amount: FiatAmount) {
        self.volume = self.volume.saturating_add(amount.as_micros());
    }

    pub fn record_payment_time(&mut self, secs: u64) {
        self.payment_time_total_secs = self.payment_time_total_secs.saturating_add(secs);
        self.payment_time_samples += 1;
    }

    pub fn record_release_time(&mut self, secs: u64) {
        self.release_time_total_secs = self.release_time_total_secs.saturating_add(secs);
        self.release_time_samples += 1;
    }

    /// Fold all counters of `other` into this profile. The caller retires
    /// `other` afterwards; merge is one-directional.
    pub fn absorb(&mut self, other: &Profile) {
        self.upvotes += other.upvotes;
        self.downvotes += other.downvotes;
        self.volume = self.volume.saturating_add(other.volume);
        self.deals_completed += other.deals_completed;
        self.deals_expired += other.deals_expired;
        self.disputes_lost += other.disputes_lost;
        self.payment_time_total_secs = self
            .payment_time_total_secs
            .saturating_add(other.payment_time_total_secs);
        self.payment_time_samples += other.payment_time_samples;
        self.release_time_total_secs = self
            .release_time_total_secs
            .saturating_add(other.release_time_total_secs);
        self.release_time_samples += other.release_time_samples;
    }
}
