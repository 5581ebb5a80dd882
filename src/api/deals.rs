use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::{caller, AppState};
use crate::db::EventRow;
use crate::domain::{Deal, DealId, FiatAmount, OfferId};
use crate::engine::TransitionOutcome;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateDealRequest {
    pub offer_id: String,
    pub fiat_amount_micros: u64,
    #[serde(default)]
    pub payment_instructions: String,
}

pub async fn create_deal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateDealRequest>,
) -> Result<Json<Deal>, AppError> {
    let taker = caller(&headers)?;
    let offer_id = OfferId::parse(&req.offer_id)
        .ok_or_else(|| AppError::BadRequest("Invalid offer id".into()))?;

    // The market rate is consumed exactly once, at deal creation.
    let offer = state.engine.offer(offer_id)?;
    let market = state
        .rates
        .market_rate(&offer.asset, &offer.fiat)
        .await
        .map_err(|e| AppError::RateSource(e.to_string()))?;

    let outcome = state.engine.create_deal(
        &taker,
        offer_id,
        FiatAmount::new(req.fiat_amount_micros),
        req.payment_instructions,
        market,
        state.clock.now(),
    )?;
    state.journal(&outcome.events).await?;
    Ok(Json(outcome.deal))
}

pub async fn get_deal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deal>, AppError> {
    Ok(Json(state.engine.deal(parse_deal_id(&id)?)?))
}

pub async fn get_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventRow>>, AppError> {
    Ok(Json(state.repo.list_events(parse_deal_id(&id)?).await?))
}

pub async fn accept(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Deal>, AppError> {
    let who = caller(&headers)?;
    let outcome = state
        .engine
        .accept(&who, parse_deal_id(&id)?, state.clock.now())?;
    finish(&state, outcome).await
}

pub async fn fund(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Deal>, AppError> {
    let who = caller(&headers)?;
    let outcome = state
        .engine
        .fund(&who, parse_deal_id(&id)?, state.clock.now())?;
    finish(&state, outcome).await
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Deal>, AppError> {
    let who = caller(&headers)?;
    let outcome = state
        .engine
        .mark_paid(&who, parse_deal_id(&id)?, state.clock.now())?;
    finish(&state, outcome).await
}

pub async fn release(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Deal>, AppError> {
    let who = caller(&headers)?;
    let outcome = state
        .engine
        .release(&who, parse_deal_id(&id)?, state.clock.now())?;
    finish(&state, outcome).await
}

pub async fn dispute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Deal>, AppError> {
    let who = caller(&headers)?;
    let outcome = state
        .engine
        .dispute(&who, parse_deal_id(&id)?, state.clock.now())?;
    finish(&state, outcome).await
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Deal>, AppError> {
    let who = caller(&headers)?;
    let outcome = state
        .engine
        .cancel(&who, parse_deal_id(&id)?, state.clock.now())?;
    finish(&state, outcome).await
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub body: String,
}

pub async fn message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<MessageRequest>,
) -> Result<Json<Deal>, AppError> {
    let who = caller(&headers)?;
    let outcome = state
        .engine
        .message(&who, parse_deal_id(&id)?, req.body, state.clock.now())?;
    finish(&state, outcome).await
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub upvote: bool,
    #[serde(default)]
    pub message: String,
}

pub async fn feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<Deal>, AppError> {
    let who = caller(&headers)?;
    let outcome = state
        .engine
        .feedback(&who, parse_deal_id(&id)?, req.upvote, req.message)?;
    finish(&state, outcome).await
}

async fn finish(state: &AppState, outcome: TransitionOutcome) -> Result<Json<Deal>, AppError> {
    state.journal(&outcome.events).await?;
    Ok(Json(outcome.deal))
}

pub(super) fn parse_deal_id(raw: &str) -> Result<DealId, AppError> {
    DealId::parse(raw).ok_or_else(|| AppError::BadRequest("Invalid deal id".into()))
}
