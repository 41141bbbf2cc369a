use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::authz::{AuthzError, DenyReason};

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {message}")]
    Denied { message: String, reason: DenyReason },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Denied { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
            AppError::Token(_) => (StatusCode::UNAUTHORIZED, "token"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<DenyReason>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let reason = match &self {
            AppError::Denied { reason, .. } => Some(*reason),
            _ => None,
        };

        let payload = ErrorResponse {
            error,
            message: self.to_string(),
            reason,
        };

        (status, Json(payload)).into_response()
    }
}

/// Inactive accounts are unauthenticated (401); every other denial is 403.
impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Denied {
                reason: DenyReason::AccountInactive,
                ..
            } => Self::Unauthorized("account inactive".to_string()),
            AuthzError::Denied { ability, reason } => Self::Denied {
                message: format!("`{ability}` denied: {reason}"),
                reason,
            },
            AuthzError::NotFound(what) => Self::NotFound(what),
            AuthzError::Conflict(what) => Self::Conflict(what),
            err @ (AuthzError::MalformedAbility(_)
            | AuthzError::MalformedResource(_)
            | AuthzError::Validation(_)) => Self::BadRequest(err.to_string()),
            AuthzError::Storage(err) => Self::Database(err),
            AuthzError::CorruptRow(detail) => Self::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authz_errors_map_to_status() {
        let cases = [
            (AuthzError::denied("users.view", DenyReason::AccountInactive), StatusCode::UNAUTHORIZED),
            (AuthzError::denied("roles.delete", DenyReason::ReferentialIntegrityBlocked), StatusCode::FORBIDDEN),
            (AuthzError::not_found("role"), StatusCode::NOT_FOUND),
            (AuthzError::conflict("role"), StatusCode::CONFLICT),
            (AuthzError::MalformedAbility("nodot".into()), StatusCode::BAD_REQUEST),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
