//! Chat service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Store failures are logged server-side and reported to clients with a
//! generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Chat service error type.
///
/// Maps to HTTP status codes:
/// - Validation: 422 Unprocessable Entity
/// - Conflict: 409 Conflict
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl ChatError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ChatError::Validation(_) => 422,
            ChatError::Conflict(_) => 409,
            ChatError::Forbidden(_) => 403,
            ChatError::NotFound(_) => 404,
            ChatError::Database(_) | ChatError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ChatError::Validation(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_FAILED",
                reason.clone(),
            ),
            ChatError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            ChatError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            ChatError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            ChatError::Database(err) => {
                tracing::error!(target: "chat.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            ChatError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Convert sqlx errors to ChatError
impl From<sqlx::Error> for ChatError {
    fn from(err: sqlx::Error) -> Self {
        ChatError::Database(err.to_string())
    }
}
