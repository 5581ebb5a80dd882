pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ratesource;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    AccountId, Asset, Claim, Clock, Deal, DealId, DealState, Fiat, FiatAmount, ManualClock,
    MarketRate, Offer, OfferId, PaymentMethod, Profile, ProfileId, Rate, SystemClock, Timestamp,
    TokenAmount,
};
pub use engine::{DealEngine, DealEvent, EngineParams, NewOffer, TransitionOutcome};
pub use error::{AppError, EngineError};
pub use ratesource::{FixedRateSource, HttpRateSource, RateSource, RateSourceError};
