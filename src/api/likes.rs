use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;

use super::error::{ApiError, ResultExt, validate_uuid};
use super::response::ApiResponse;
use crate::auth::ApiAuth;
use crate::db::{Database, LikeTarget};
use crate::impl_has_auth_state;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct LikesState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_state!(LikesState);

pub fn router(state: LikesState) -> Router {
    Router::new()
        .route("/toggle/v/{video_id}", post(toggle_video_like))
        .route("/toggle/c/{comment_id}", post(toggle_comment_like))
        .route("/toggle/t/{tweet_id}", post(toggle_tweet_like))
        .route("/videos", get(liked_videos))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeStatus {
    is_liked: bool,
}

async fn toggle(
    db: &Database,
    user_id: i64,
    target: LikeTarget,
    what: &str,
) -> Result<ApiResponse<LikeStatus>, ApiError> {
    let is_liked = db
        .likes()
        .toggle(user_id, target)
        .await
        .db_err("Failed to toggle like")?;

    let message = if is_liked {
        format!("Liked {}", what)
    } else {
        format!("Unliked {}", what)
    };
    Ok(ApiResponse::ok(LikeStatus { is_liked }, message))
}

async fn toggle_video_like(
    State(state): State<LikesState>,
    ApiAuth(auth): ApiAuth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&video_id, "video")?;
    let video = state
        .db
        .videos()
        .get_by_uuid(&video_id)
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    toggle(&state.db, auth.user.id, LikeTarget::Video(video.id), "video").await
}

async fn toggle_comment_like(
    State(state): State<LikesState>,
    ApiAuth(auth): ApiAuth,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&comment_id, "comment")?;
    let comment = state
        .db
        .comments()
        .get_by_uuid(&comment_id)
        .await
        .db_err("Failed to load comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    toggle(&state.db, auth.user.id, LikeTarget::Comment(comment.id), "comment").await
}

async fn toggle_tweet_like(
    State(state): State<LikesState>,
    ApiAuth(auth): ApiAuth,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&tweet_id, "tweet")?;
    let tweet = state
        .db
        .tweets()
        .get_by_uuid(&tweet_id)
        .await
        .db_err("Failed to load tweet")?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;

    toggle(&state.db, auth.user.id, LikeTarget::Tweet(tweet.id), "tweet").await
}

async fn liked_videos(
    State(state): State<LikesState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    let videos = state
        .db
        .likes()
        .liked_videos(auth.user.id)
        .await
        .db_err("Failed to load liked videos")?;

    Ok(ApiResponse::ok(videos, "Liked videos fetched successfully"))
}
