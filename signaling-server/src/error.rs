//! HTTP error taxonomy for the signaling service's REST surface.
//!
//! Mirrors the conceptual error taxonomy of the wire protocol: each
//! variant carries the HTTP status it maps to, and serializes to a small
//! JSON envelope rather than leaking internal detail to the caller.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid credentials")]
    AuthenticationFailed,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("upstream dependency unavailable")]
    ServiceUnavailable,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            ApiError::AuthenticationFailed => (StatusCode::UNAUTHORIZED, "AUTHENTICATION_FAILED"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::ServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
        };
        let message = self.to_string();
        (
            status,
            Json(ErrorEnvelope { code, message }),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "database failure");
        ApiError::ServiceUnavailable
    }
}
