//! Domain primitives: ids, fixed-point amounts, timestamps, and the injected clock.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// Fiat amounts are fixed-point with six decimal places (1.0 = 1_000_000).
pub const FIAT_SCALE: u64 = 1_000_000;

/// Margin rates are fixed-point with four decimal places (1.0x = 10_000).
pub const RATE_SCALE: u64 = 10_000;

/// Market rates share the fiat scale: fiat units per whole token, ×1_000_000.
pub const MARKET_RATE_SCALE: u64 = 1_000_000;

/// Time in seconds since Unix epoch, supplied by the caller on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn new(secs: i64) -> Self {
        Timestamp(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Deadline arithmetic; saturates rather than wrapping on absurd windows.
    pub fn plus(&self, secs: i64) -> Self {
        Timestamp(self.0.saturating_add(secs))
    }

    /// Elapsed seconds since `earlier`, clamped at zero.
    pub fn since(&self, earlier: Timestamp) -> i64 {
        (self.0 - earlier.0).max(0)
    }
}

/// Participant identity (opaque account string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset symbol (e.g. "BTC", "USDC"). Decimals live in the config whitelist.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Asset(pub String);

impl Asset {
    pub fn new(symbol: impl Into<String>) -> Self {
        Asset(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fiat currency code (e.g. "USD", "EUR").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fiat(pub String);

impl Fiat {
    pub fn new(code: impl Into<String>) -> Self {
        Fiat(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fiat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment method slug (e.g. "bank_transfer").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PaymentMethod(pub String);

impl PaymentMethod {
    pub fn new(method: impl Into<String>) -> Self {
        PaymentMethod(method.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fiat amount, fixed-point ×1_000_000.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct FiatAmount(pub u64);

impl FiatAmount {
    pub fn new(micros: u64) -> Self {
        FiatAmount(micros)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Token amount in the asset's native base units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TokenAmount(pub u128);

impl TokenAmount {
    pub fn new(base_units: u128) -> Self {
        TokenAmount(base_units)
    }

    pub fn as_base_units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Offer margin rate, fixed-point ×10_000 (10_000 = 1.0x market).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rate(pub u32);

impl Rate {
    pub fn new(scaled: u32) -> Self {
        Rate(scaled)
    }

    /// Rate from a margin percent over market: `floor((1 + r/100) × 10_000)`.
    /// Negative margins (discounts) are allowed down to, but not including, -100%.
    pub fn from_margin_percent(r: i64) -> Option<Self> {
        let scaled = (100 + r).checked_mul(RATE_SCALE as i64)? / 100;
        if scaled <= 0 || scaled > u32::MAX as i64 {
            return None;
        }
        Some(Rate(scaled as u32))
    }

    pub fn as_scaled(&self) -> u32 {
        self.0
    }
}

/// Market rate from the price oracle: fiat micros per whole token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarketRate(pub u64);

impl MarketRate {
    pub fn new(fiat_micros_per_token: u64) -> Self {
        MarketRate(fiat_micros_per_token)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Option<Self> {
                Uuid::parse_str(s).ok().map($name)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique offer identifier.
    OfferId
);
uuid_id!(
    /// Unique deal identifier.
    DealId
);
uuid_id!(
    /// Unique reputation profile identifier.
    ProfileId
);

/// Clock abstraction so the API layer injects wall time while tests drive it by hand.
/// The engine itself never reads a clock; it takes a `Timestamp` per transition.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock used by the running service.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(chrono::Utc::now().timestamp())
    }
}

/// Test clock with settable time.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start.as_secs()),
        }
    }

    pub fn set(&self, t: Timestamp) {
        self.now.store(t.as_secs(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::SeqCst))
    }
}
