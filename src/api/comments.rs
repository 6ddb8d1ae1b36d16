use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiJson, ApiQuery, ResultExt, required, validate_uuid};
use super::response::{ApiResponse, Empty, PageQuery};
use crate::auth::ApiAuth;
use crate::db::{Comment, Database};
use crate::impl_has_auth_state;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct CommentsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_state!(CommentsState);

pub fn router(state: CommentsState) -> Router {
    Router::new()
        .route("/{video_id}", get(list_comments).post(add_comment))
        .route("/c/{comment_id}", patch(update_comment).delete(delete_comment))
        .with_state(state)
}

#[derive(Deserialize)]
struct CommentRequest {
    content: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentResponse {
    id: String,
    content: String,
    video: String,
    owner: String,
    created_at: String,
    updated_at: String,
}

impl CommentResponse {
    fn new(comment: Comment, video: String, owner: String) -> Self {
        Self {
            id: comment.uuid,
            content: comment.content,
            video,
            owner,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// Resolve a comment the caller must own. Ownership failures are 400s.
async fn load_owned_comment(
    db: &Database,
    comment_id: &str,
    user_id: i64,
    action: &str,
) -> Result<Comment, ApiError> {
    validate_uuid(comment_id, "comment")?;
    let comment = db
        .comments()
        .get_by_uuid(comment_id)
        .await
        .db_err("Failed to load comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    if comment.owner_id != user_id {
        return Err(ApiError::bad_request(format!(
            "Only the comment owner can {} their comment",
            action
        )));
    }
    Ok(comment)
}

/// Public id of a comment's video; empty if the video has been deleted.
async fn video_uuid(db: &Database, video_id: i64) -> Result<String, ApiError> {
    Ok(db
        .videos()
        .get_by_id(video_id)
        .await
        .db_err("Failed to load video")?
        .map(|v| v.uuid)
        .unwrap_or_default())
}

async fn list_comments(
    State(state): State<CommentsState>,
    ApiAuth(auth): ApiAuth,
    Path(video_id): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&video_id, "video")?;
    let video = state
        .db
        .videos()
        .get_by_uuid(&video_id)
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    let comments = state
        .db
        .comments()
        .list_for_video(video.id, auth.user.id, query.page())
        .await
        .db_err("Failed to list comments")?;

    Ok(ApiResponse::ok(comments, "Comments fetched successfully"))
}

async fn add_comment(
    State(state): State<CommentsState>,
    ApiAuth(auth): ApiAuth,
    Path(video_id): Path<String>,
    ApiJson(payload): ApiJson<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = required(payload.content.as_deref(), "Content")?;
    validate_uuid(&video_id, "video")?;

    let video = state
        .db
        .videos()
        .get_by_uuid(&video_id)
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    let comment = state
        .db
        .comments()
        .create(video.id, auth.user.id, content)
        .await
        .db_err("Failed to create comment")?;

    Ok(ApiResponse::created(
        CommentResponse::new(comment, video.uuid, auth.user.uuid),
        "Comment added successfully",
    ))
}

async fn update_comment(
    State(state): State<CommentsState>,
    ApiAuth(auth): ApiAuth,
    Path(comment_id): Path<String>,
    ApiJson(payload): ApiJson<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = required(payload.content.as_deref(), "Content")?;
    let comment = load_owned_comment(&state.db, &comment_id, auth.user.id, "edit").await?;

    let updated = state
        .db
        .comments()
        .update_content(comment.id, content)
        .await
        .db_err("Failed to update comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    let video = video_uuid(&state.db, updated.video_id).await?;

    Ok(ApiResponse::ok(
        CommentResponse::new(updated, video, auth.user.uuid),
        "Comment edited successfully",
    ))
}

async fn delete_comment(
    State(state): State<CommentsState>,
    ApiAuth(auth): ApiAuth,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = load_owned_comment(&state.db, &comment_id, auth.user.id, "delete").await?;

    state
        .db
        .comments()
        .delete(comment.id)
        .await
        .db_err("Failed to delete comment")?;

    Ok(ApiResponse::ok(Empty {}, "Comment deleted successfully"))
}
