// ============================================================================
// Error Handling - HTTP-facing error type
// ============================================================================
//
// Internal failures (database, remote ERP transport) are logged server-side
// with full detail and surfaced to clients as generic messages. Validation
// diagnostics (blocking preflight issues) are returned verbatim because the
// operator needs them to fix the proposal.
//
// ============================================================================

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::models::snapshot::PreflightIssue;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] JsonRejection),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable: {message}")]
    Unprocessable {
        message: String,
        errors: Vec<PreflightIssue>,
    },

    #[error("Remote ERP error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Column values that fail to parse into their enum are data corruption,
    /// not client errors.
    pub fn corrupt_column(column: &str, detail: String) -> Self {
        AppError::Internal(anyhow::anyhow!("invalid value in column {}: {}", column, detail))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, errors) = match self {
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), None)
            }
            AppError::Validation(ref e) => {
                tracing::debug!("Validation failed: {}", e);
                (StatusCode::BAD_REQUEST, "Validation failed".to_string(), None)
            }
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "Invalid JSON".to_string(), None),
            AppError::JsonParsing(ref e) => {
                tracing::error!("JSON parsing error: {:?}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON format".to_string(), None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::Unprocessable { message, errors } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, Some(errors))
            }
            AppError::Upstream(msg) => {
                tracing::error!("Remote ERP error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg, None)
            }
            AppError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), None)
            }
        };

        let mut body = json!({
            "error": error_message,
            "status": status.as_u16()
        });
        if let Some(errors) = errors {
            body["errors"] = json!(errors);
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
