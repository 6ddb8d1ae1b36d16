//! Authentication user types.

use crate::db::User;
use crate::jwt::AccessClaims;

/// The account behind a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Account loaded from the database, without password or refresh token
    pub user: User,
    /// JWT claims from the access token
    pub claims: AccessClaims,
}
