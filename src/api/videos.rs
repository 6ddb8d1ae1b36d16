use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Path, State},
    response::IntoResponse,
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ApiMultipart, ApiQuery, ResultExt, required, validate_uuid};
use super::response::{ApiResponse, Empty, PageQuery};
use super::upload::{read_multipart, relay_upload};
use crate::auth::ApiAuth;
use crate::db::{Database, NewVideo, Video, VideoFilter, VideoSort, VideoUpdate, VideoWithOwner};
use crate::impl_has_auth_state;
use crate::jwt::JwtConfig;
use crate::media::MediaRelay;

/// Video file plus thumbnail in one request.
const MAX_VIDEO_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Clone)]
pub struct VideosState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub media: Arc<MediaRelay>,
    pub upload_dir: Arc<PathBuf>,
}

impl_has_auth_state!(VideosState);

pub fn router(state: VideosState) -> Router {
    Router::new()
        .route("/", get(list_videos).post(publish_video))
        .route(
            "/{video_id}",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/toggle/publish/{video_id}", patch(toggle_publish))
        .layer(DefaultBodyLimit::max(MAX_VIDEO_UPLOAD_BYTES))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListVideosQuery {
    page: Option<u32>,
    limit: Option<u32>,
    query: Option<String>,
    sort_by: Option<String>,
    sort_type: Option<String>,
    user_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishStatus {
    is_published: bool,
}

/// Resolve a video id path parameter.
async fn load_video(db: &Database, video_id: &str) -> Result<Video, ApiError> {
    validate_uuid(video_id, "video")?;
    db.videos()
        .get_by_uuid(video_id)
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video not found"))
}

/// Resolve a video the caller must own.
async fn load_owned_video(db: &Database, video_id: &str, user_id: i64) -> Result<Video, ApiError> {
    let video = load_video(db, video_id).await?;
    if video.owner_id != user_id {
        return Err(ApiError::forbidden("Only the owner can modify this video"));
    }
    Ok(video)
}

async fn with_owner(db: &Database, video_id: i64) -> Result<VideoWithOwner, ApiError> {
    db.videos()
        .get_with_owner(video_id)
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video not found"))
}

async fn list_videos(
    State(state): State<VideosState>,
    ApiAuth(auth): ApiAuth,
    ApiQuery(query): ApiQuery<ListVideosQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = match query.sort_by.as_deref() {
        None => VideoSort::default(),
        Some(s) => VideoSort::parse(s).ok_or_else(|| ApiError::bad_request("Invalid sortBy"))?,
    };
    let ascending = match query.sort_type.as_deref() {
        None | Some("desc") => false,
        Some("asc") => true,
        Some(_) => return Err(ApiError::bad_request("Invalid sortType")),
    };

    let owner_id = match query.user_id.as_deref() {
        None => None,
        Some(user_id) => {
            validate_uuid(user_id, "user")?;
            let owner = state
                .db
                .users()
                .get_by_uuid(user_id)
                .await
                .db_err("Failed to load user")?
                .ok_or_else(|| ApiError::not_found("User not found"))?;
            Some(owner.id)
        }
    };

    let search = query.query.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let videos = state
        .db
        .videos()
        .list(
            &VideoFilter {
                viewer_id: auth.user.id,
                owner_id,
                search,
                sort,
                ascending,
            },
            PageQuery {
                page: query.page,
                limit: query.limit,
            }
            .page(),
        )
        .await
        .db_err("Failed to list videos")?;

    Ok(ApiResponse::ok(videos, "Videos fetched successfully"))
}

async fn publish_video(
    State(state): State<VideosState>,
    ApiAuth(auth): ApiAuth,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = read_multipart(multipart, &state.upload_dir).await?;

    let title = required(form.text("title"), "Title")?.to_string();
    let description = required(form.text("description"), "Description")?.to_string();
    let video_file = form
        .take_file("videoFile")
        .ok_or_else(|| ApiError::bad_request("Video file is required"))?;
    let thumbnail_file = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::bad_request("Thumbnail is required"))?;

    let video_upload = relay_upload(&state.media, Some(video_file), "video")
        .await?
        .ok_or_else(|| ApiError::bad_request("Video file is required"))?;

    let thumbnail = match relay_upload(&state.media, Some(thumbnail_file), "thumbnail").await {
        Ok(Some(thumbnail)) => thumbnail,
        Ok(None) => {
            state.media.delete(&video_upload.media).await;
            return Err(ApiError::bad_request("Thumbnail is required"));
        }
        Err(e) => {
            state.media.delete(&video_upload.media).await;
            return Err(e);
        }
    };

    let created = state
        .db
        .videos()
        .create(&NewVideo {
            owner_id: auth.user.id,
            title: &title,
            description: &description,
            video_file: &video_upload.media,
            thumbnail: &thumbnail.media,
            duration: video_upload.duration.unwrap_or(0.0),
        })
        .await;

    let video = match created {
        Ok(video) => video,
        Err(e) => {
            state.media.delete(&video_upload.media).await;
            state.media.delete(&thumbnail.media).await;
            return Err(ApiError::db_error("Failed to create video", e));
        }
    };

    info!(video = %video.uuid, owner = %auth.user.username, "Video published");

    Ok(ApiResponse::created(
        with_owner(&state.db, video.id).await?,
        "Video uploaded successfully",
    ))
}

/// Video page. Counts a view and records it in the viewer's history.
async fn get_video(
    State(state): State<VideosState>,
    ApiAuth(auth): ApiAuth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video = load_video(&state.db, &video_id).await?;

    if !video.is_published && video.owner_id != auth.user.id {
        return Err(ApiError::not_found("Video not found"));
    }

    state
        .db
        .videos()
        .record_view(video.id, auth.user.id)
        .await
        .db_err("Failed to record view")?;

    let detail = state
        .db
        .videos()
        .detail(video.id, auth.user.id)
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(ApiResponse::ok(detail, "Video fetched successfully"))
}

async fn update_video(
    State(state): State<VideosState>,
    ApiAuth(auth): ApiAuth,
    Path(video_id): Path<String>,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<impl IntoResponse, ApiError> {
    let video = load_owned_video(&state.db, &video_id, auth.user.id).await?;
    let mut form = read_multipart(multipart, &state.upload_dir).await?;

    let title = form.text("title").map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let description = form
        .text("description")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let thumbnail_file = form.take_file("thumbnail");

    if title.is_none() && description.is_none() && thumbnail_file.is_none() {
        return Err(ApiError::bad_request(
            "Provide a title, description or thumbnail to update",
        ));
    }

    let thumbnail = relay_upload(&state.media, thumbnail_file, "thumbnail").await?;

    let updated = state
        .db
        .videos()
        .update(
            video.id,
            &VideoUpdate {
                title: title.as_deref(),
                description: description.as_deref(),
                thumbnail: thumbnail.as_ref().map(|t| &t.media),
            },
        )
        .await
        .db_err("Failed to update video")?;

    if !updated {
        if let Some(thumbnail) = &thumbnail {
            state.media.delete(&thumbnail.media).await;
        }
        return Err(ApiError::not_found("Video not found"));
    }

    if thumbnail.is_some() {
        state.media.delete(&video.thumbnail).await;
    }

    Ok(ApiResponse::ok(
        with_owner(&state.db, video.id).await?,
        "Video updated successfully",
    ))
}

/// Hard delete. Comments and likes on the video are not removed.
async fn delete_video(
    State(state): State<VideosState>,
    ApiAuth(auth): ApiAuth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video = load_owned_video(&state.db, &video_id, auth.user.id).await?;

    let deleted = state
        .db
        .videos()
        .delete(video.id)
        .await
        .db_err("Failed to delete video")?;
    if !deleted {
        return Err(ApiError::not_found("Video not found"));
    }

    state.media.delete(&video.video_file).await;
    state.media.delete(&video.thumbnail).await;

    info!(video = %video.uuid, "Video deleted");

    Ok(ApiResponse::ok(Empty {}, "Video deleted successfully"))
}

async fn toggle_publish(
    State(state): State<VideosState>,
    ApiAuth(auth): ApiAuth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video = load_owned_video(&state.db, &video_id, auth.user.id).await?;

    let is_published = state
        .db
        .videos()
        .toggle_publish(video.id)
        .await
        .db_err("Failed to toggle publish status")?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(ApiResponse::ok(
        PublishStatus { is_published },
        "Publish status toggled successfully",
    ))
}
