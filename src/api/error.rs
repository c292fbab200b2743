//! Mapping of `KantorError` onto HTTP responses.
//!
//! Body shape is always `{ "error": "<message>" }`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::types::KantorError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl KantorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            KantorError::InvalidAmount
            | KantorError::UnknownCurrency(_)
            | KantorError::SameCurrency
            | KantorError::InsufficientFunds { .. }
            | KantorError::RateUnavailable { .. }
            | KantorError::BalanceLimit { .. }
            | KantorError::BadRequest(_)
            | KantorError::InvalidRegistration(_)
            | KantorError::EmailTaken => StatusCode::BAD_REQUEST,
            KantorError::InvalidCredentials | KantorError::MissingToken => StatusCode::UNAUTHORIZED,
            KantorError::InvalidToken => StatusCode::FORBIDDEN,
            KantorError::RateProvider(_) | KantorError::Storage(_) | KantorError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Unreadable bodies (bad JSON, wrong field types, wrong content type)
/// are all plain 400s.
impl From<JsonRejection> for KantorError {
    fn from(rejection: JsonRejection) -> Self {
        KantorError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for KantorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            KantorError::RateProvider(detail) => {
                error!(detail = %detail, "Rate provider failure");
                "rate provider error".to_string()
            }
            KantorError::Storage(detail) | KantorError::Internal(detail) => {
                // Internal details stay in the log.
                error!(detail = %detail, "Request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
