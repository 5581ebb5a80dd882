pub mod deals;
pub mod disputes;
pub mod health;
pub mod offers;
pub mod profiles;
pub mod vault;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{AccountId, Clock};
use crate::engine::{DealEngine, DealEvent};
use crate::error::AppError;
use axum::http::HeaderMap;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DealEngine>,
    pub repo: Arc<Repository>,
    pub rates: Arc<dyn crate::ratesource::RateSource>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
}

impl AppState {
    /// Append the events of a completed transition to the journal.
    pub async fn journal(&self, events: &[DealEvent]) -> Result<(), AppError> {
        let at = self.clock.now();
        for event in events {
            self.repo.record_event(event, at).await?;
        }
        Ok(())
    }
}

/// Caller identity from the `x-account` header. Authentication proper sits in
/// front of this service; the header carries the already-verified account.
pub fn caller(headers: &HeaderMap) -> Result<AccountId, AppError> {
    let raw = headers
        .get("x-account")
        .ok_or_else(|| AppError::BadRequest("Missing x-account header".into()))?
        .to_str()
        .map_err(|_| AppError::BadRequest("Invalid x-account header".into()))?;
    if raw.is_empty() {
        return Err(AppError::BadRequest("Empty x-account header".into()));
    }
    Ok(AccountId::new(raw))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/offers", post(offers::create_offer))
        .route("/v1/offers/:id", get(offers::get_offer))
        .route("/v1/offers/:id/rate", post(offers::set_rate))
        .route("/v1/offers/:id/limits", post(offers::set_limits))
        .route("/v1/offers/:id/terms", post(offers::set_terms))
        .route("/v1/offers/:id/disabled", post(offers::set_disabled))
        .route("/v1/vault/deposit", post(vault::deposit))
        .route("/v1/vault/collateral", post(vault::deposit_collateral))
        .route("/v1/vault/balance", get(vault::get_balance))
        .route("/v1/deals", post(deals::create_deal))
        .route("/v1/deals/:id", get(deals::get_deal))
        .route("/v1/deals/:id/events", get(deals::get_events))
        .route("/v1/deals/:id/accept", post(deals::accept))
        .route("/v1/deals/:id/fund", post(deals::fund))
        .route("/v1/deals/:id/paid", post(deals::mark_paid))
        .route("/v1/deals/:id/release", post(deals::release))
        .route("/v1/deals/:id/dispute", post(deals::dispute))
        .route("/v1/deals/:id/cancel", post(deals::cancel))
        .route("/v1/deals/:id/message", post(deals::message))
        .route("/v1/deals/:id/feedback", post(deals::feedback))
        .route("/v1/deals/:id/assert", post(disputes::assert_claim))
        .route("/v1/deals/:id/challenge", post(disputes::challenge))
        .route("/v1/deals/:id/settle", post(disputes::settle))
        .route("/v1/deals/:id/assertion", get(disputes::get_assertion))
        .route("/v1/profiles", post(profiles::register))
        .route("/v1/profiles/merge", post(profiles::merge))
        .route("/v1/profiles/:id", get(profiles::get_profile))
        .route("/v1/profiles/primary", get(profiles::get_primary))
        .layer(cors)
        .with_state(state)
}
