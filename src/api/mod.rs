mod comments;
mod error;
mod likes;
mod response;
mod subscriptions;
mod tweets;
mod upload;
mod users;
mod videos;

use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::media::MediaRelay;

pub use error::ApiError;
pub use response::ApiResponse;
pub use users::{UserResponse, UsersState};

/// Create the API router, mounted under `/api/v1` by the app.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    media: Arc<MediaRelay>,
    upload_dir: Arc<PathBuf>,
    secure_cookies: bool,
) -> Router {
    let videos_state = videos::VideosState {
        db: db.clone(),
        jwt: jwt.clone(),
        media: media.clone(),
        upload_dir: upload_dir.clone(),
    };

    let comments_state = comments::CommentsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let likes_state = likes::LikesState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let subscriptions_state = subscriptions::SubscriptionsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let tweets_state = tweets::TweetsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let users_state = users::UsersState {
        db,
        jwt,
        media,
        upload_dir,
        secure_cookies,
    };

    Router::new()
        .nest("/users", users::router(users_state))
        .nest("/videos", videos::router(videos_state))
        .nest("/comment", comments::router(comments_state))
        .nest("/likes", likes::router(likes_state))
        .nest("/subscriptions", subscriptions::router(subscriptions_state))
        .nest("/tweet", tweets::router(tweets_state))
}
