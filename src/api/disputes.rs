use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::deals::parse_deal_id;
use super::{caller, AppState};
use crate::domain::{Claim, Deal};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct AssertRequest {
    pub claim: Claim,
    /// Collateral bonded behind the claim, as a decimal string (u128 range).
    pub bond: String,
}

pub async fn assert_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AssertRequest>,
) -> Result<Json<Deal>, AppError> {
    let who = caller(&headers)?;
    let bond = req
        .bond
        .parse::<u128>()
        .map_err(|_| AppError::BadRequest("Invalid bond amount".into()))?;
    let outcome = state.engine.assert_claim(
        &who,
        parse_deal_id(&id)?,
        req.claim,
        bond,
        state.clock.now(),
    )?;
    state.journal(&outcome.events).await?;
    Ok(Json(outcome.deal))
}

pub async fn challenge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Deal>, AppError> {
    let who = caller(&headers)?;
    let outcome = state
        .engine
        .challenge(&who, parse_deal_id(&id)?, state.clock.now())?;
    state.journal(&outcome.events).await?;
    Ok(Json(outcome.deal))
}

/// Settlement needs no caller identity; the liveness check is what gates it.
pub async fn settle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deal>, AppError> {
    let outcome = state
        .engine
        .settle(parse_deal_id(&id)?, state.clock.now())?;
    state.journal(&outcome.events).await?;
    Ok(Json(outcome.deal))
}

pub async fn get_assertion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deal = parse_deal_id(&id)?;
    match state.engine.live_assertion(deal) {
        Some(a) => Ok(Json(json!({
            "deal_id": a.deal.to_string(),
            "claim": a.claim,
            "bond": a.bond.to_string(),
            "asserter": a.asserter,
            "deadline_secs": a.deadline.as_secs(),
        }))),
        None => Ok(Json(json!(null))),
    }
}
