use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiJson, ResultExt, required, validate_uuid};
use super::response::{ApiResponse, Empty};
use crate::auth::ApiAuth;
use crate::db::{Database, Tweet};
use crate::impl_has_auth_state;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct TweetsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_state!(TweetsState);

pub fn router(state: TweetsState) -> Router {
    Router::new()
        .route("/", post(create_tweet))
        .route("/user/{user_id}", get(user_tweets))
        .route("/{tweet_id}", patch(update_tweet).delete(delete_tweet))
        .with_state(state)
}

#[derive(Deserialize)]
struct TweetRequest {
    content: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TweetResponse {
    id: String,
    content: String,
    owner: String,
    created_at: String,
    updated_at: String,
}

impl TweetResponse {
    fn new(tweet: Tweet, owner: String) -> Self {
        Self {
            id: tweet.uuid,
            content: tweet.content,
            owner,
            created_at: tweet.created_at,
            updated_at: tweet.updated_at,
        }
    }
}

/// Resolve a tweet the caller must own. Ownership failures are 401s.
async fn load_owned_tweet(
    db: &Database,
    tweet_id: &str,
    user_id: i64,
    action: &str,
) -> Result<Tweet, ApiError> {
    validate_uuid(tweet_id, "tweet")?;
    let tweet = db
        .tweets()
        .get_by_uuid(tweet_id)
        .await
        .db_err("Failed to load tweet")?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;

    if tweet.owner_id != user_id {
        return Err(ApiError::unauthorized(format!(
            "Only owner can {} tweet",
            action
        )));
    }
    Ok(tweet)
}

async fn create_tweet(
    State(state): State<TweetsState>,
    ApiAuth(auth): ApiAuth,
    ApiJson(payload): ApiJson<TweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = required(payload.content.as_deref(), "Content")?;

    let tweet = state
        .db
        .tweets()
        .create(auth.user.id, content)
        .await
        .db_err("Failed to create tweet")?;

    Ok(ApiResponse::created(
        TweetResponse::new(tweet, auth.user.uuid),
        "Tweet created successfully",
    ))
}

async fn user_tweets(
    State(state): State<TweetsState>,
    ApiAuth(_auth): ApiAuth,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&user_id, "user")?;
    let owner = state
        .db
        .users()
        .get_by_uuid(&user_id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let tweets = state
        .db
        .tweets()
        .list_by_owner(owner.id)
        .await
        .db_err("Failed to load tweets")?;

    Ok(ApiResponse::ok(tweets, "Tweets fetched successfully"))
}

async fn update_tweet(
    State(state): State<TweetsState>,
    ApiAuth(auth): ApiAuth,
    Path(tweet_id): Path<String>,
    ApiJson(payload): ApiJson<TweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = required(payload.content.as_deref(), "Content")?;
    let tweet = load_owned_tweet(&state.db, &tweet_id, auth.user.id, "update").await?;

    let updated = state
        .db
        .tweets()
        .update_content(tweet.id, content)
        .await
        .db_err("Failed to update tweet")?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;

    Ok(ApiResponse::ok(
        TweetResponse::new(updated, auth.user.uuid),
        "Tweet updated successfully",
    ))
}

async fn delete_tweet(
    State(state): State<TweetsState>,
    ApiAuth(auth): ApiAuth,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tweet = load_owned_tweet(&state.db, &tweet_id, auth.user.id, "delete").await?;

    state
        .db
        .tweets()
        .delete(tweet.id)
        .await
        .db_err("Failed to delete tweet")?;

    Ok(ApiResponse::ok(Empty {}, "Tweet deleted successfully"))
}
