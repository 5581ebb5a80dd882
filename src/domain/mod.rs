//! Domain types for the deal-settlement engine.
//!
//! This module provides:
//! - Fixed-point numeric primitives at the protocol scales
//! - Identity and time primitives, including the injected clock
//! - Offer, Deal, Assertion, and Profile aggregates

pub mod assertion;
pub mod deal;
pub mod offer;
pub mod primitives;
pub mod profile;

pub use assertion::Assertion;
pub use deal::{ChatMessage, Claim, Deal, DealState};
pub use offer::Offer;
pub use primitives::{
    AccountId, Asset, Clock, DealId, Fiat, FiatAmount, ManualClock, MarketRate, OfferId,
    PaymentMethod, ProfileId, Rate, SystemClock, Timestamp, TokenAmount, FIAT_SCALE,
    MARKET_RATE_SCALE, RATE_SCALE,
};
pub use profile::Profile;
