use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Domain error taxonomy. Every fallible operation in the account core
/// reports one of these; none is retried and none is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed input or policy violation. Nothing was mutated.
    #[error("{0}")]
    Validation(String),

    /// Email already belongs to another account.
    #[error("email already registered")]
    DuplicateEmail,

    /// Unknown email or wrong password. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, expired, or revoked bearer token.
    #[error("please authenticate")]
    Unauthenticated,

    /// Update payload contained a field outside the allowed set.
    #[error("invalid update field: {0}")]
    InvalidUpdate(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidUpdate(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            // unique_violation on the users email constraint
            if db.code().as_deref() == Some("23505") {
                return AppError::DuplicateEmail;
            }
        }
        AppError::Internal(e.into())
    }
}
