use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::{caller, AppState};
use crate::domain::{AccountId, Asset};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub asset: String,
    /// Base units of the asset, as a decimal string (u128 range).
    pub amount: String,
}

pub async fn deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DepositRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let who = caller(&headers)?;
    let amount = parse_amount(&req.amount)?;
    let balance = state
        .engine
        .deposit(&who, &Asset::new(req.asset.clone()), amount)?;
    Ok(Json(json!({
        "asset": req.asset,
        "balance": balance.to_string(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct CollateralRequest {
    pub amount: String,
}

pub async fn deposit_collateral(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CollateralRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let who = caller(&headers)?;
    let amount = parse_amount(&req.amount)?;
    let collateral = state.engine.deposit_collateral(&who, amount);
    Ok(Json(json!({ "collateral": collateral.to_string() })))
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub account: String,
    pub asset: String,
}

pub async fn get_balance(
    State(state): State<AppState>,
    Query(params): Query<BalanceQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let account = AccountId::new(params.account);
    let asset = Asset::new(params.asset.clone());
    let balance = state.engine.balance_of(&account, &asset);
    let collateral = state.engine.collateral_of(&account);
    Ok(Json(json!({
        "asset": params.asset,
        "balance": balance.to_string(),
        "collateral": collateral.to_string(),
    })))
}

fn parse_amount(raw: &str) -> Result<u128, AppError> {
    raw.parse::<u128>()
        .map_err(|_| AppError::BadRequest("Invalid amount".into()))
}
