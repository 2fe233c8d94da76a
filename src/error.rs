// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error (message is logged, never sent to the client)
    InternalServerError(String),

    // 400 Bad Request, with optional field-level detail (e.g. offending ids)
    Validation(String, Vec<String>),

    // 400 Bad Request - a business rule blocked the operation
    // (insufficient points, out of stock, already completed, ...)
    BusinessRule(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate username, allocation already run)
    Conflict(String),

    // 503 Service Unavailable - store-level timeout/connection failure that
    // survived the retry budget
    Transient(String),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into(), Vec::new())
    }

    /// Whether the retry wrapper may re-run the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, detail) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    Vec::new(),
                )
            }
            AppError::Validation(msg, detail) => (StatusCode::BAD_REQUEST, msg, detail),
            AppError::BusinessRule(msg) => (StatusCode::BAD_REQUEST, msg, Vec::new()),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg, Vec::new()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, Vec::new()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, Vec::new()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, Vec::new()),
            AppError::Transient(msg) => {
                tracing::error!("Store unavailable after retries: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                    Vec::new(),
                )
            }
        };
        let body = if detail.is_empty() {
            Json(json!({ "error": error_message }))
        } else {
            Json(json!({ "error": error_message, "detail": detail }))
        };

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError`.
/// Allows using `?` operator on database queries. Connection-level failures
/// map to `Transient` so the retry wrapper can classify them.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
                AppError::Transient(err.to_string())
            }
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            _ => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::bad_request(err.to_string())
    }
}
