//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, error};

use super::cookie::{ACCESS_COOKIE_NAME, get_bearer_token, get_cookie};
use super::errors::AuthErrorKind;
use super::state::HasAuthState;
use super::types::AuthenticatedUser;
use crate::api::ApiError;

/// Resolve the access token of a request to its account.
/// The `accessToken` cookie takes precedence over the Bearer header.
async fn authenticate_request<S>(
    parts: &Parts,
    state: &S,
) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthState + Send + Sync,
{
    let token = get_cookie(&parts.headers, ACCESS_COOKIE_NAME)
        .filter(|t| !t.is_empty())
        .or_else(|| get_bearer_token(&parts.headers))
        .ok_or(AuthErrorKind::NotAuthenticated)?;

    let claims = state.jwt().validate_access_token(token).map_err(|e| {
        debug!("Rejected access token: {}", e);
        AuthErrorKind::InvalidToken
    })?;

    let user = state
        .db()
        .users()
        .get_by_uuid(&claims.sub)
        .await
        .map_err(|e| {
            error!("Failed to get user: {}", e);
            AuthErrorKind::DatabaseError
        })?
        .ok_or(AuthErrorKind::UserNotFound)?;

    Ok(AuthenticatedUser { user, claims })
}

/// Extractor for API endpoints that require authentication.
/// Rejects with the JSON error envelope; the handler never runs.
pub struct ApiAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for ApiAuth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(ApiAuth)
            .map_err(ApiError::from)
    }
}
