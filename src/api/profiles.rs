use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::{caller, AppState};
use crate::domain::{AccountId, Profile, ProfileId};
use crate::error::AppError;

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Profile>, AppError> {
    let who = caller(&headers)?;
    Ok(Json(state.engine.register_profile(&who, state.clock.now())))
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub into: String,
    pub from: String,
}

pub async fn merge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MergeRequest>,
) -> Result<Json<Profile>, AppError> {
    let who = caller(&headers)?;
    let into = parse_profile_id(&req.into)?;
    let from = parse_profile_id(&req.from)?;
    Ok(Json(state.engine.merge_profiles(&who, into, from)?))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.engine.profile(parse_profile_id(&id)?)?))
}

#[derive(Debug, Deserialize)]
pub struct PrimaryQuery {
    pub account: String,
}

pub async fn get_primary(
    State(state): State<AppState>,
    Query(params): Query<PrimaryQuery>,
) -> Result<Json<Profile>, AppError> {
    state
        .engine
        .primary_profile(&AccountId::new(params.account.clone()))
        .map(Json)
        .ok_or_else(|| {
            crate::error::EngineError::NotFound(format!("profile for {}", params.account)).into()
        })
}

fn parse_profile_id(raw: &str) -> Result<ProfileId, AppError> {
    ProfileId::parse(raw).ok_or_else(|| AppError::BadRequest("Invalid profile id".into()))
}
