//! Error types for the school ledger server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchData = 4,
    BadValue = 5,
    Duplicate = 6,
    NotAvailable = 7,
    InvalidCredentials = 8,
    AccountLocked = 9,
    InvalidCode = 10,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account locked: {0}")]
    AccountLocked(String),

    #[error("Invalid or expired recovery code")]
    InvalidCode,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.is_unique_violation() {
                return AppError::Conflict("A record with the same unique value already exists".to_string());
            }
            if db.is_foreign_key_violation() {
                return AppError::Conflict("Record is referenced by other records".to_string());
            }
            // numeric_value_out_of_range
            if db.code().as_deref() == Some("22003") {
                return AppError::Validation("amount: Value exceeds the supported range".to_string());
            }
        }
        AppError::Database(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join("; "))
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    /// HTTP status and client-facing code for this error
    pub fn status(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::InvalidCredentials => (StatusCode::BAD_REQUEST, ErrorCode::InvalidCredentials),
            AppError::AccountLocked(_) => (StatusCode::FORBIDDEN, ErrorCode::AccountLocked),
            AppError::InvalidCode => (StatusCode::BAD_REQUEST, ErrorCode::InvalidCode),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            AppError::Validation(_) | AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Unavailable(_) => (StatusCode::BAD_REQUEST, ErrorCode::NotAvailable),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::InvalidCredentials | AppError::InvalidCode => self.to_string(),
            AppError::Authentication(msg)
            | AppError::AccountLocked(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Unavailable(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
