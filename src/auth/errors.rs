//! Authentication error types.

use tracing::error;

use crate::api::ApiError;

/// Why a protected request was turned away.
#[derive(Debug)]
pub enum AuthErrorKind {
    /// No token in the cookie or the Authorization header
    NotAuthenticated,
    /// Bad signature, expired, or wrong token type
    InvalidToken,
    /// Token is valid but its account no longer exists
    UserNotFound,
    DatabaseError,
}

impl From<AuthErrorKind> for ApiError {
    fn from(kind: AuthErrorKind) -> Self {
        match kind {
            AuthErrorKind::NotAuthenticated => ApiError::unauthorized("Unauthorized request"),
            AuthErrorKind::InvalidToken | AuthErrorKind::UserNotFound => {
                ApiError::unauthorized("Invalid access token")
            }
            AuthErrorKind::DatabaseError => ApiError::internal("Database error"),
        }
    }
}

/// Errors from the refresh token lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid refresh token")]
    InvalidToken,
    #[error("refresh token is expired or used")]
    Stale,
    #[error("token signing failed: {0}")]
    Jwt(#[from] crate::jwt::JwtError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidToken => ApiError::unauthorized("Invalid refresh token"),
            SessionError::Stale => ApiError::unauthorized("Refresh token is expired or used"),
            SessionError::Jwt(e) => {
                error!("Failed to generate tokens: {}", e);
                ApiError::internal("Failed to generate tokens")
            }
            SessionError::Database(e) => ApiError::db_error("Session update failed", e),
        }
    }
}
