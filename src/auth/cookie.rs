//! Cookie and header parsing for authentication.

use axum::http::{HeaderMap, header};

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn get_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Build a `Set-Cookie` value for a session cookie.
pub fn session_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        name,
        value,
        max_age,
        if secure { "; Secure" } else { "" }
    )
}

/// Build a `Set-Cookie` value that removes a session cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}
