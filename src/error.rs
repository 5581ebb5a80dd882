use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Engine error taxonomy. Every rejected call carries the specific guard that
/// failed so callers can decide whether to wait, retry, or force a
/// timeout-driven transition. All variants are local, synchronous, and
/// non-retryable by the engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("action not allowed in this state: {0}")]
    InvalidState(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u128, available: u128 },
    #[error("feedback already given for this deal by this party")]
    DuplicateFeedback,
    #[error("a live assertion already exists for this deal")]
    DuplicateAssertion,
    #[error("not found: {0}")]
    NotFound(String),
}

impl EngineError {
    /// Stable machine-readable kind, surfaced in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Unauthorized(_) => "unauthorized",
            EngineError::InvalidState(_) => "invalid_state",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::InsufficientFunds { .. } => "insufficient_funds",
            EngineError::DuplicateFeedback => "duplicate_feedback",
            EngineError::DuplicateAssertion => "duplicate_assertion",
            EngineError::NotFound(_) => "not_found",
        }
    }
}

/// Application-level error for the HTTP surface.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("rate source error: {0}")]
    RateSource(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AppError::Engine(e) => {
                let status = match e {
                    EngineError::Unauthorized(_) => StatusCode::FORBIDDEN,
                    EngineError::InvalidState(_) => StatusCode::CONFLICT,
                    EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    EngineError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    EngineError::DuplicateFeedback => StatusCode::CONFLICT,
                    EngineError::DuplicateAssertion => StatusCode::CONFLICT,
                    EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                };
                (status, e.kind(), e.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::RateSource(msg) => (StatusCode::BAD_GATEWAY, "rate_source", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg.clone())
            }
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}
