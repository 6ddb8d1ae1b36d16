use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use tracing::debug;

use super::error::{ApiError, ResultExt, validate_uuid};
use super::response::ApiResponse;
use crate::auth::ApiAuth;
use crate::db::{Database, User};
use crate::impl_has_auth_state;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct SubscriptionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_state!(SubscriptionsState);

pub fn router(state: SubscriptionsState) -> Router {
    Router::new()
        .route(
            "/c/{channel_id}",
            get(channel_subscribers).post(toggle_subscription),
        )
        .route("/u/{subscriber_id}", get(subscribed_channels))
        .with_state(state)
}

#[derive(Serialize)]
struct SubscriptionStatus {
    subscribed: bool,
}

async fn load_user(db: &Database, id: &str, what: &str) -> Result<User, ApiError> {
    validate_uuid(id, what)?;
    db.users()
        .get_by_uuid(id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("Channel not found"))
}

async fn toggle_subscription(
    State(state): State<SubscriptionsState>,
    ApiAuth(auth): ApiAuth,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let channel = load_user(&state.db, &channel_id, "channel").await?;

    if channel.id == auth.user.id {
        return Err(ApiError::bad_request("You cannot subscribe to your own channel"));
    }

    let subscribed = state
        .db
        .subscriptions()
        .toggle(auth.user.id, channel.id)
        .await
        .db_err("Failed to toggle subscription")?;

    debug!(
        subscriber = %auth.user.username,
        channel = %channel.username,
        subscribed,
        "Subscription toggled"
    );

    let message = if subscribed {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(ApiResponse::ok(SubscriptionStatus { subscribed }, message))
}

async fn channel_subscribers(
    State(state): State<SubscriptionsState>,
    ApiAuth(_auth): ApiAuth,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let channel = load_user(&state.db, &channel_id, "channel").await?;

    let subscribers = state
        .db
        .subscriptions()
        .subscribers(channel.id)
        .await
        .db_err("Failed to load subscribers")?;

    Ok(ApiResponse::ok(subscribers, "Subscribers fetched successfully"))
}

async fn subscribed_channels(
    State(state): State<SubscriptionsState>,
    ApiAuth(_auth): ApiAuth,
    Path(subscriber_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let subscriber = load_user(&state.db, &subscriber_id, "subscriber").await?;

    let channels = state
        .db
        .subscriptions()
        .subscribed_channels(subscriber.id)
        .await
        .db_err("Failed to load subscribed channels")?;

    Ok(ApiResponse::ok(
        channels,
        "Subscribed channels fetched successfully",
    ))
}
