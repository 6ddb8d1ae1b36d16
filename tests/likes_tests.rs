//! Tests for the like endpoints.

mod common;

use axum::http::StatusCode;
use common::{TestContext, json_request, setup};
use serde_json::json;

async fn like_rows(ctx: &TestContext) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM likes")
        .fetch_one(ctx.db.pool())
        .await
        .unwrap();
    count
}

#[tokio::test]
async fn test_register_login_like_twice_leaves_no_like() {
    let ctx = setup().await;
    let amy = ctx.sign_up("amy").await;
    let video = ctx.publish_video(&amy, "Video").await;
    let uri = format!("/api/v1/likes/toggle/v/{}", video);

    let liked = ctx.post_empty(&uri, &amy).await;
    assert_eq!(liked.status, StatusCode::OK);
    assert_eq!(liked.data()["isLiked"], true);
    assert_eq!(liked.message(), "Liked video");
    assert_eq!(like_rows(&ctx).await, 1);

    let unliked = ctx.post_empty(&uri, &amy).await;
    assert_eq!(unliked.status, StatusCode::OK);
    assert_eq!(unliked.data()["isLiked"], false);
    assert_eq!(unliked.message(), "Unliked video");
    assert_eq!(like_rows(&ctx).await, 0);
}

#[tokio::test]
async fn test_like_comment_and_tweet() {
    let ctx = setup().await;
    let amy = ctx.sign_up("amy").await;
    let video = ctx.publish_video(&amy, "Video").await;

    let comment = ctx
        .send(json_request(
            "POST",
            &format!("/api/v1/comment/{}", video),
            Some(&amy.access_token),
            json!({ "content": "nice" }),
        ))
        .await;
    let comment_id = comment.data()["id"].as_str().unwrap().to_string();

    let tweet = ctx
        .send(json_request(
            "POST",
            "/api/v1/tweet",
            Some(&amy.access_token),
            json!({ "content": "hello" }),
        ))
        .await;
    let tweet_id = tweet.data()["id"].as_str().unwrap().to_string();

    let on_comment = ctx
        .post_empty(&format!("/api/v1/likes/toggle/c/{}", comment_id), &amy)
        .await;
    assert_eq!(on_comment.data()["isLiked"], true);
    assert_eq!(on_comment.message(), "Liked comment");

    let on_tweet = ctx
        .post_empty(&format!("/api/v1/likes/toggle/t/{}", tweet_id), &amy)
        .await;
    assert_eq!(on_tweet.data()["isLiked"], true);
    assert_eq!(on_tweet.message(), "Liked tweet");

    // Same user, different targets: independent likes
    assert_eq!(like_rows(&ctx).await, 2);

    let feed = ctx
        .get(&format!("/api/v1/tweet/user/{}", amy.user_id), &amy)
        .await;
    assert_eq!(feed.data()[0]["likesCount"], 1);
}

#[tokio::test]
async fn test_like_missing_target() {
    let ctx = setup().await;
    let amy = ctx.sign_up("amy").await;

    let missing = ctx
        .post_empty(
            &format!("/api/v1/likes/toggle/v/{}", uuid::Uuid::new_v4()),
            &amy,
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let invalid = ctx
        .post_empty("/api/v1/likes/toggle/t/12345", &amy)
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.message(), "Invalid tweet id");

    assert_eq!(like_rows(&ctx).await, 0);
}

#[tokio::test]
async fn test_liked_videos_newest_first() {
    let ctx = setup().await;
    let amy = ctx.sign_up("amy").await;
    let bob = ctx.sign_up("bob").await;
    let first = ctx.publish_video(&amy, "First").await;
    let second = ctx.publish_video(&amy, "Second").await;
    let unliked = ctx.publish_video(&amy, "Skipped").await;

    for video in [&first, &second] {
        ctx.post_empty(&format!("/api/v1/likes/toggle/v/{}", video), &bob)
            .await;
    }
    // Liked and unliked again: not in the list
    for _ in 0..2 {
        ctx.post_empty(&format!("/api/v1/likes/toggle/v/{}", unliked), &bob)
            .await;
    }

    let response = ctx.get("/api/v1/likes/videos", &bob).await;
    assert_eq!(response.status, StatusCode::OK);
    let liked = response.data().as_array().unwrap();
    assert_eq!(liked.len(), 2);
    assert_eq!(liked[0]["likedVideo"]["id"], second.as_str());
    assert_eq!(liked[1]["likedVideo"]["id"], first.as_str());
    assert_eq!(liked[0]["likedVideo"]["owner"], amy.user_id.as_str());
    assert_eq!(liked[0]["likedVideo"]["ownerDetails"]["username"], "amy");

    let amys = ctx.get("/api/v1/likes/videos", &amy).await;
    assert!(amys.data().as_array().unwrap().is_empty());
}
