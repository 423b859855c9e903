//! Maps [`flow_core::EngineError`] onto HTTP status codes (spec.md §7).
//!
//! `Forbidden` maps to 400, not 403 — the original service's handlers never
//! distinguished the two and downstream consumers depend on it, so this
//! keeps the historical (if semantically odd) status code rather than
//! "fixing" a contract nothing asked to change.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flow_core::EngineError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Wraps an [`EngineError`] with the HTTP verb context needed to pick the
/// right status for `NotFound` (404 on delete, 400 everywhere else).
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn from_engine_error(err: EngineError, not_found_is_404: bool) -> Self {
        let status = match &err {
            EngineError::Input(_) => StatusCode::BAD_REQUEST,
            EngineError::Forbidden(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) if not_found_is_404 => StatusCode::NOT_FOUND,
            EngineError::NotFound(_) => StatusCode::BAD_REQUEST,
            EngineError::WorkloadNotFound(_) => StatusCode::BAD_REQUEST,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = %err, "internal error handling request");
        } else {
            tracing::debug!(error = %err, "request rejected");
        }
        Self { status, message: err.to_string() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self { status: StatusCode::UNAUTHORIZED, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}
