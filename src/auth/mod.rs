//! JWT authentication.
//!
//! Dual-token system: access tokens are stateless and checked on every
//! protected request; each account has a single active refresh token stored
//! on its row, overwritten on login and rotated on refresh.

mod cookie;
mod errors;
mod extractors;
pub mod session;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_bearer_token, get_cookie,
    session_cookie,
};
pub use errors::{AuthErrorKind, SessionError};
pub use extractors::ApiAuth;
pub use session::TokenPair;
pub use state::HasAuthState;
pub use types::AuthenticatedUser;
