//! Error codes and the HTTP error envelope.
//!
//! DESIGN
//! ======
//! Every module owns a `thiserror` enum. Each enum implements [`ErrorCode`]
//! so handlers can render a uniform body: a human message, a grepable
//! `E_*` code, and a retryable flag. Handlers never attach partial rows to
//! an error response, so a failed listing can't show stale data.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Grepable error code and retryable flag for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// JSON error body returned by every handler.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub retryable: bool,
}

/// Handler-level error: an HTTP status plus a structured body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    /// Build from any typed error with an explicit status.
    pub fn from_code(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Self {
        Self {
            status,
            body: ErrorBody { error: err.to_string(), code: err.error_code(), retryable: err.retryable() },
        }
    }

    /// Build from a plain message.
    pub fn message(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, body: ErrorBody { error: message.into(), code, retryable: false } }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::message(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "Not authenticated")
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::message(StatusCode::FORBIDDEN, "E_FORBIDDEN", "Admin access required")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
