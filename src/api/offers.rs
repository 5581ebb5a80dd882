use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::{caller, AppState};
use crate::domain::{FiatAmount, Offer, OfferId};
use crate::engine::NewOffer;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub is_sell: bool,
    pub asset: String,
    pub fiat: String,
    pub method: String,
    pub margin_percent: i64,
    pub min_fiat_micros: u64,
    pub max_fiat_micros: u64,
    #[serde(default)]
    pub terms: String,
}

pub async fn create_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateOfferRequest>,
) -> Result<Json<Offer>, AppError> {
    let owner = caller(&headers)?;
    let offer = state.engine.create_offer(
        &owner,
        NewOffer {
            is_sell: req.is_sell,
            asset: req.asset,
            fiat: req.fiat,
            method: req.method,
            margin_percent: req.margin_percent,
            min_fiat: FiatAmount::new(req.min_fiat_micros),
            max_fiat: FiatAmount::new(req.max_fiat_micros),
            terms: req.terms,
        },
    )?;
    Ok(Json(offer))
}

pub async fn get_offer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Offer>, AppError> {
    Ok(Json(state.engine.offer(parse_offer_id(&id)?)?))
}

#[derive(Debug, Deserialize)]
pub struct SetRateRequest {
    pub margin_percent: i64,
}

pub async fn set_rate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SetRateRequest>,
) -> Result<Json<Offer>, AppError> {
    let who = caller(&headers)?;
    let offer = state
        .engine
        .set_offer_rate(&who, parse_offer_id(&id)?, req.margin_percent)?;
    Ok(Json(offer))
}

#[derive(Debug, Deserialize)]
pub struct SetLimitsRequest {
    pub min_fiat_micros: u64,
    pub max_fiat_micros: u64,
}

pub async fn set_limits(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SetLimitsRequest>,
) -> Result<Json<Offer>, AppError> {
    let who = caller(&headers)?;
    let offer = state.engine.set_offer_limits(
        &who,
        parse_offer_id(&id)?,
        FiatAmount::new(req.min_fiat_micros),
        FiatAmount::new(req.max_fiat_micros),
    )?;
    Ok(Json(offer))
}

#[derive(Debug, Deserialize)]
pub struct SetTermsRequest {
    pub terms: String,
}

pub async fn set_terms(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SetTermsRequest>,
) -> Result<Json<Offer>, AppError> {
    let who = caller(&headers)?;
    let offer = state
        .engine
        .set_offer_terms(&who, parse_offer_id(&id)?, req.terms)?;
    Ok(Json(offer))
}

#[derive(Debug, Deserialize)]
pub struct SetDisabledRequest {
    pub disabled: bool,
}

pub async fn set_disabled(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SetDisabledRequest>,
) -> Result<Json<Offer>, AppError> {
    let who = caller(&headers)?;
    let offer = state
        .engine
        .set_offer_disabled(&who, parse_offer_id(&id)?, req.disabled)?;
    Ok(Json(offer))
}

fn parse_offer_id(raw: &str) -> Result<OfferId, AppError> {
    OfferId::parse(raw).ok_or_else(|| AppError::BadRequest("Invalid offer id".into()))
}
