//! Account flow errors and their HTTP representation.
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub const INVALID_CREDENTIALS: &str = "Invalid email and/or password.";

#[derive(Error, Debug)]
pub enum AccountError {
    /// One message per failed field rule.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("invalid credentials")]
    Authentication,

    #[error("invalid or expired session token")]
    InvalidSession,

    #[error("account not confirmed")]
    AccountBlocked,

    #[error("user already registered")]
    Conflict,

    #[error("invalid or already used token")]
    InvalidToken,

    #[error("store unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("password reset failed: {0}")]
    ResetFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AccountError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccountError::Validation(_)
            | AccountError::Conflict
            | AccountError::InvalidToken
            | AccountError::ResetFailed(_) => StatusCode::BAD_REQUEST,
            AccountError::Authentication | AccountError::InvalidSession => {
                StatusCode::UNAUTHORIZED
            }
            AccountError::AccountBlocked => StatusCode::FORBIDDEN,
            AccountError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller; never carries store or library detail.
    pub fn public_message(&self) -> String {
        match self {
            AccountError::Validation(msgs) => msgs.join(" "),
            AccountError::Authentication => INVALID_CREDENTIALS.to_string(),
            AccountError::InvalidSession => "Invalid or expired session.".to_string(),
            AccountError::AccountBlocked => "Account blocked.".to_string(),
            AccountError::Conflict => "User already registered.".to_string(),
            AccountError::InvalidToken => "Invalid or expired token.".to_string(),
            AccountError::ServiceUnavailable(_) => {
                "Could not connect to the database.".to_string()
            }
            AccountError::ResetFailed(_) => "Error resetting password.".to_string(),
            AccountError::Internal(_) => "An internal server error occurred.".to_string(),
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AccountError::Validation(msgs) => json!({ "error": msgs }),
            other => json!({ "error": other.public_message() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Malformed bodies are reported like any other invalid input.
impl From<JsonRejection> for AccountError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(status = %rejection.status(), "rejected request body");
        AccountError::Validation(vec!["Invalid request body.".into()])
    }
}

impl From<tokio::task::JoinError> for AccountError {
    fn from(e: tokio::task::JoinError) -> Self {
        AccountError::Internal(e.to_string())
    }
}
