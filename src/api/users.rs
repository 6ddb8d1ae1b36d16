//! Account endpoints: registration, login, session refresh and profile
//! updates.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, header},
    response::{AppendHeaders, IntoResponse},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::error::{ApiError, ApiJson, ApiMultipart, ResultExt, required};
use super::response::{ApiResponse, Empty};
use super::upload::{read_multipart, relay_upload};
use crate::auth::{
    ACCESS_COOKIE_NAME, ApiAuth, REFRESH_COOKIE_NAME, TokenPair, clear_cookie, get_cookie,
    session, session_cookie,
};
use crate::db::{Database, NewUser, User, VideoWithOwner, is_unique_violation};
use crate::impl_has_auth_state;
use crate::jwt::JwtConfig;
use crate::media::{MediaRef, MediaRelay};
use crate::password::{hash_password, verify_password};

/// Avatar and cover image uploads.
const MAX_IMAGE_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub media: Arc<MediaRelay>,
    pub upload_dir: Arc<PathBuf>,
    pub secure_cookies: bool,
}

impl_has_auth_state!(UsersState);

pub fn router(state: UsersState) -> Router {
    let uploads = Router::new()
        .route("/register", post(register))
        .route("/update-avatar", patch(update_avatar))
        .route("/update-coverImg", patch(update_cover_image))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_UPLOAD_BYTES));

    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-user", patch(update_user))
        .route("/c/{username}", get(channel_profile))
        .route("/history", get(watch_history))
        .merge(uploads)
        .with_state(state)
}

/// Public view of an account.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: MediaRef,
    pub cover_image: Option<MediaRef>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.uuid,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar: user.avatar,
            cover_image: user.cover_image,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user: UserResponse,
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokensResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: Option<String>,
    new_password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    full_name: Option<String>,
    email: Option<String>,
}

fn session_cookies(pair: &TokenPair, secure: bool) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    AppendHeaders([
        (
            header::SET_COOKIE,
            session_cookie(ACCESS_COOKIE_NAME, &pair.access.token, pair.access.duration, secure),
        ),
        (
            header::SET_COOKIE,
            session_cookie(REFRESH_COOKIE_NAME, &pair.refresh.token, pair.refresh.duration, secure),
        ),
    ])
}

fn cleared_cookies(secure: bool) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    AppendHeaders([
        (header::SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, secure)),
        (header::SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, secure)),
    ])
}

fn hash(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })
}

async fn register(
    State(state): State<UsersState>,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = read_multipart(multipart, &state.upload_dir).await?;

    let full_name = required(form.text("fullName"), "Full name")?.to_string();
    let email = required(form.text("email"), "Email")?.to_lowercase();
    let username = required(form.text("username"), "Username")?.to_lowercase();
    let password = required(form.text("password"), "Password")?.to_string();

    if !email.contains('@') {
        return Err(ApiError::bad_request("Email is invalid"));
    }

    let avatar_file = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    let cover_file = form.take_file("coverImage");

    if state
        .db
        .users()
        .is_taken(&username, &email)
        .await
        .db_err("Failed to check existing users")?
    {
        return Err(ApiError::conflict(
            "User with email or username already exists",
        ));
    }

    let password_hash = hash(&password)?;

    let avatar = relay_upload(&state.media, Some(avatar_file), "avatar")
        .await?
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    let cover_image = match relay_upload(&state.media, cover_file, "cover image").await {
        Ok(cover_image) => cover_image,
        Err(e) => {
            state.media.delete(&avatar.media).await;
            return Err(e);
        }
    };

    let created = state
        .db
        .users()
        .create(&NewUser {
            username: &username,
            email: &email,
            full_name: &full_name,
            password_hash: &password_hash,
            avatar: &avatar.media,
            cover_image: cover_image.as_ref().map(|c| &c.media),
        })
        .await;

    let user = match created {
        Ok(user) => user,
        Err(e) => {
            // Lost a race with a concurrent registration, or the insert failed
            state.media.delete(&avatar.media).await;
            if let Some(cover) = &cover_image {
                state.media.delete(&cover.media).await;
            }
            if is_unique_violation(&e) {
                return Err(ApiError::conflict(
                    "User with email or username already exists",
                ));
            }
            return Err(ApiError::db_error("Failed to create user", e));
        }
    };

    info!(username = %user.username, "User registered");

    Ok(ApiResponse::created(
        UserResponse::from(user),
        "User registered successfully",
    ))
}

async fn login(
    State(state): State<UsersState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let email = payload.email.as_deref().map(str::trim).filter(|s| !s.is_empty());

    if username.is_none() && email.is_none() {
        return Err(ApiError::bad_request("Username or email is required"));
    }
    let password = required(payload.password.as_deref(), "Password")?;

    let credentials = state
        .db
        .users()
        .find_credentials(username, email)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !verify_password(password, &credentials.password_hash) {
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let user = credentials.user;
    let pair = session::issue(&state.db, &state.jwt, &user).await?;

    info!(username = %user.username, "User logged in");

    let cookies = session_cookies(&pair, state.secure_cookies);
    let body = LoginResponse {
        user: user.into(),
        access_token: pair.access.token,
        refresh_token: pair.refresh.token,
    };

    Ok((cookies, ApiResponse::ok(body, "User logged in successfully")))
}

async fn logout(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    session::revoke(&state.db, auth.user.id).await?;

    Ok((
        cleared_cookies(state.secure_cookies),
        ApiResponse::ok(Empty {}, "User logged out"),
    ))
}

/// Rotate the session. The refresh token comes from the cookie, or from a
/// JSON body `{"refreshToken": ...}` for clients without cookies.
async fn refresh_token(
    State(state): State<UsersState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .and_then(|r| r.refresh_token)
    };

    let presented = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or(from_body)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let (_user, pair) = session::rotate(&state.db, &state.jwt, &presented).await?;

    let cookies = session_cookies(&pair, state.secure_cookies);
    let body = TokensResponse {
        access_token: pair.access.token,
        refresh_token: pair.refresh.token,
    };

    Ok((cookies, ApiResponse::ok(body, "Access token refreshed")))
}

async fn change_password(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let old_password = required(payload.old_password.as_deref(), "Old password")?;
    let new_password = required(payload.new_password.as_deref(), "New password")?;

    let stored = state
        .db
        .users()
        .get_password_hash(auth.user.id)
        .await
        .db_err("Failed to load password")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(old_password, &stored) {
        return Err(ApiError::bad_request("Invalid old password"));
    }

    let new_hash = hash(new_password)?;
    state
        .db
        .users()
        .set_password(auth.user.id, &new_hash)
        .await
        .db_err("Failed to update password")?;

    Ok(ApiResponse::ok(Empty {}, "Password changed successfully"))
}

async fn current_user(ApiAuth(auth): ApiAuth) -> ApiResponse<UserResponse> {
    ApiResponse::ok(auth.user.into(), "Current user fetched successfully")
}

async fn update_user(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(full_name), Some(email)) = (
        payload.full_name.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        payload.email.as_deref().map(str::trim).filter(|s| !s.is_empty()),
    ) else {
        return Err(ApiError::bad_request("All fields are required"));
    };

    if !email.contains('@') {
        return Err(ApiError::bad_request("Email is invalid"));
    }

    let user = match state
        .db
        .users()
        .update_account(auth.user.id, full_name, email)
        .await
    {
        Ok(user) => user.ok_or_else(|| ApiError::not_found("User not found"))?,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Email is already in use"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update account", e)),
    };

    Ok(ApiResponse::ok(
        UserResponse::from(user),
        "Account details updated successfully",
    ))
}

async fn update_avatar(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = read_multipart(multipart, &state.upload_dir).await?;
    let file = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::bad_request("Avatar file is missing"))?;

    let uploaded = relay_upload(&state.media, Some(file), "avatar")
        .await?
        .ok_or_else(|| ApiError::bad_request("Avatar file is missing"))?;

    let user = state
        .db
        .users()
        .set_avatar(auth.user.id, &uploaded.media)
        .await
        .db_err("Failed to update avatar")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    // Superseded asset; a failed delete must not fail the update
    state.media.delete(&auth.user.avatar).await;

    Ok(ApiResponse::ok(
        UserResponse::from(user),
        "Avatar image updated successfully",
    ))
}

async fn update_cover_image(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = read_multipart(multipart, &state.upload_dir).await?;
    let file = form
        .take_file("coverImage")
        .ok_or_else(|| ApiError::bad_request("Cover image file is missing"))?;

    let uploaded = relay_upload(&state.media, Some(file), "cover image")
        .await?
        .ok_or_else(|| ApiError::bad_request("Cover image file is missing"))?;

    let user = state
        .db
        .users()
        .set_cover_image(auth.user.id, &uploaded.media)
        .await
        .db_err("Failed to update cover image")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(old) = &auth.user.cover_image {
        state.media.delete(old).await;
    }

    Ok(ApiResponse::ok(
        UserResponse::from(user),
        "Cover image updated successfully",
    ))
}

async fn channel_profile(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let username = required(Some(username.as_str()), "Username")?;

    let profile = state
        .db
        .users()
        .channel_profile(username, auth.user.id)
        .await
        .db_err("Failed to load channel")?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

async fn watch_history(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
) -> Result<ApiResponse<Vec<VideoWithOwner>>, ApiError> {
    let history = state
        .db
        .videos()
        .watch_history(auth.user.id)
        .await
        .db_err("Failed to load watch history")?;

    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
