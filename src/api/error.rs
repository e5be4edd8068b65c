//! Axum-facing error wrapper: a thin `IntoResponse` sum type at the HTTP
//! boundary that wraps `EngineError`, so the status code follows the
//! engine's own error *kind* rather than guessing from text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::EngineError;

#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Insufficient { .. } => StatusCode::PAYMENT_REQUIRED,
            EngineError::Stale(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::TransientUpstream(_) => StatusCode::BAD_GATEWAY,
            EngineError::PermanentUpstream(_) => StatusCode::BAD_GATEWAY,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": self.0.user_message(),
            "kind": self.0.kind(),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}
