//! Authentication state trait and macro.

use crate::db::Database;
use crate::jwt::JwtConfig;

/// Trait for state types that provide database and JWT access for authentication.
pub trait HasAuthState {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
}

/// Implement `HasAuthState` for a state struct with `jwt: Arc<JwtConfig>`
/// and `db: Database` fields.
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct VideosState {
///     pub db: Database,
///     pub jwt: Arc<JwtConfig>,
///     pub media: Arc<MediaRelay>,
/// }
///
/// impl_has_auth_state!(VideosState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_state {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthState for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
        }
    };
}
