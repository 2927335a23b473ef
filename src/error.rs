// Error taxonomy for the rewards pipeline and the coin ledger

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by ledger-affecting operations.
///
/// Any error raised inside a database transaction aborts it; nothing is
/// partially applied.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::InsufficientBalance { .. } => StatusCode::CONFLICT,
            LedgerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
            LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for LedgerError {
    fn from(rejection: JsonRejection) -> Self {
        LedgerError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for LedgerError {
    fn from(rejection: QueryRejection) -> Self {
        LedgerError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for LedgerError {
    fn from(rejection: PathRejection) -> Self {
        LedgerError::Validation(rejection.body_text())
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            LedgerError::Store(e) => {
                error!("Store failure: {}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
