//! Refresh token lifecycle: issue on login, rotate on refresh, revoke on
//! logout.
//!
//! The account row holds at most one refresh token. Issuing overwrites it,
//! so a login on one device silently ends the refresh session of another.

use tracing::{debug, info};

use super::errors::SessionError;
use crate::db::{Database, User};
use crate::jwt::{JwtConfig, SignedToken};

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: SignedToken,
    pub refresh: SignedToken,
}

/// Issue a new pair for `user` and store the refresh token as the active one.
pub async fn issue(db: &Database, jwt: &JwtConfig, user: &User) -> Result<TokenPair, SessionError> {
    let access = jwt.generate_access_token(user)?;
    let refresh = jwt.generate_refresh_token(&user.uuid)?;

    db.users()
        .set_refresh_token(user.id, Some(&refresh.token))
        .await?;

    debug!(user_id = user.id, "Issued session tokens");
    Ok(TokenPair { access, refresh })
}

/// Exchange a refresh token for a new pair. The presented token must equal
/// the stored one at the moment of the swap, so a rotated-away token is
/// rejected and concurrent rotations of one token yield a single winner.
pub async fn rotate(
    db: &Database,
    jwt: &JwtConfig,
    presented: &str,
) -> Result<(User, TokenPair), SessionError> {
    let claims = jwt
        .validate_refresh_token(presented)
        .map_err(|_| SessionError::InvalidToken)?;

    let user = db
        .users()
        .get_by_uuid(&claims.sub)
        .await?
        .ok_or(SessionError::InvalidToken)?;

    let access = jwt.generate_access_token(&user)?;
    let refresh = jwt.generate_refresh_token(&user.uuid)?;

    let swapped = db
        .users()
        .replace_refresh_token(user.id, presented, &refresh.token)
        .await?;
    if !swapped {
        info!(user_id = user.id, "Rejected stale refresh token");
        return Err(SessionError::Stale);
    }

    debug!(user_id = user.id, "Rotated session tokens");
    Ok((user, TokenPair { access, refresh }))
}

/// Clear the stored refresh token so it can no longer be rotated.
pub async fn revoke(db: &Database, user_id: i64) -> Result<(), SessionError> {
    db.users().set_refresh_token(user_id, None).await?;
    debug!(user_id, "Revoked session");
    Ok(())
}
