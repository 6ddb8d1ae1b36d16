//! Tests for the account endpoints.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{
    PASSWORD, empty_request, file_count, json_request, multipart_request, setup,
};
use serde_json::json;

#[tokio::test]
async fn test_register_returns_public_user() {
    let ctx = setup().await;

    let user = ctx.register("Amy").await;

    assert_eq!(user["username"], "amy");
    assert_eq!(user["email"], "amy@example.com");
    assert_eq!(user["fullName"], "Amy Example");
    assert!(user["avatar"]["url"].as_str().unwrap().starts_with("http://localhost/media/"));
    assert!(user["coverImage"].is_null());
    assert!(user.get("password").is_none());
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("refreshToken").is_none());

    // Avatar relayed to the media dir, staging dir left empty
    assert_eq!(file_count(&ctx.media_dir()), 1);
    assert_eq!(file_count(&ctx.upload_dir()), 0);
}

#[tokio::test]
async fn test_register_duplicate_is_conflict() {
    let ctx = setup().await;
    ctx.register("amy").await;

    let response = ctx
        .send(multipart_request(
            "POST",
            "/api/v1/users/register",
            None,
            &[
                ("fullName", "Other Amy"),
                ("email", "other@example.com"),
                ("username", "AMY"),
                ("password", PASSWORD),
            ],
            &[("avatar", "a.png", "png")],
        ))
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.message(), "User with email or username already exists");
    assert_eq!(response.json["success"], false);
    assert!(response.json["data"].is_null());
    // The rejected request uploaded nothing
    assert_eq!(file_count(&ctx.media_dir()), 1);
}

#[tokio::test]
async fn test_register_requires_avatar() {
    let ctx = setup().await;

    let response = ctx
        .send(multipart_request(
            "POST",
            "/api/v1/users/register",
            None,
            &[
                ("fullName", "Amy"),
                ("email", "amy@example.com"),
                ("username", "amy"),
                ("password", PASSWORD),
            ],
            &[("coverImage", "c.png", "png")],
        ))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "Avatar file is required");
    assert_eq!(file_count(&ctx.media_dir()), 0);
    assert_eq!(file_count(&ctx.upload_dir()), 0);
}

#[tokio::test]
async fn test_register_rejects_blank_fields() {
    let ctx = setup().await;

    let response = ctx
        .send(multipart_request(
            "POST",
            "/api/v1/users/register",
            None,
            &[
                ("fullName", "   "),
                ("email", "amy@example.com"),
                ("username", "amy"),
                ("password", PASSWORD),
            ],
            &[("avatar", "a.png", "png")],
        ))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "Full name is required");
}

#[tokio::test]
async fn test_login_sets_session_cookies() {
    let ctx = setup().await;
    ctx.register("amy").await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "email": "AMY@example.com", "password": PASSWORD }),
        ))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.message(), "User logged in successfully");
    assert_eq!(response.data()["user"]["username"], "amy");
    assert!(response.data()["accessToken"].is_string());
    assert!(response.data()["refreshToken"].is_string());

    let cookies = response.set_cookies();
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));
    for cookie in &cookies {
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
    }
}

#[tokio::test]
async fn test_login_failures() {
    let ctx = setup().await;
    ctx.register("amy").await;

    let wrong_password = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "amy", "password": "nope" }),
        ))
        .await;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.message(), "Invalid user credentials");

    let unknown = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "bob", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.message(), "User does not exist");

    let missing = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "password": PASSWORD }),
        ))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let ctx = setup().await;

    let response = ctx
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/users/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["success"], false);
    assert_eq!(response.json["statusCode"], 400);
    assert!(response.json["errors"].is_array());
}

#[tokio::test]
async fn test_register_without_multipart_uses_error_envelope() {
    let ctx = setup().await;

    let response = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/register",
            None,
            json!({ "username": "amy", "password": PASSWORD }),
        ))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["success"], false);
    assert!(response.json["data"].is_null());
}

#[tokio::test]
async fn test_current_user_with_cookie_and_bearer() {
    let ctx = setup().await;
    let session = ctx.sign_up("amy").await;

    let by_cookie = ctx
        .send(
            Request::builder()
                .uri("/api/v1/users/current-user")
                .header(header::COOKIE, format!("accessToken={}", session.access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(by_cookie.status, StatusCode::OK);
    assert_eq!(by_cookie.data()["id"], session.user_id.as_str());

    let by_bearer = ctx.get("/api/v1/users/current-user", &session).await;
    assert_eq!(by_bearer.status, StatusCode::OK);
    assert_eq!(by_bearer.data()["username"], "amy");
}

#[tokio::test]
async fn test_protected_route_rejects_missing_and_bad_tokens() {
    let ctx = setup().await;

    let missing = ctx
        .send(empty_request("GET", "/api/v1/users/current-user", None))
        .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.message(), "Unauthorized request");

    let garbage = ctx
        .send(empty_request(
            "GET",
            "/api/v1/users/current-user",
            Some("not.a.token"),
        ))
        .await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.message(), "Invalid access token");
}

#[tokio::test]
async fn test_refresh_token_rotation() {
    let ctx = setup().await;
    let session = ctx.sign_up("amy").await;

    let refreshed = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/refresh-token",
            None,
            json!({ "refreshToken": session.refresh_token }),
        ))
        .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert_eq!(refreshed.message(), "Access token refreshed");
    let new_refresh = refreshed.data()["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, session.refresh_token);
    assert_eq!(refreshed.set_cookies().len(), 2);

    // The superseded token is dead
    let replay = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/refresh-token",
            None,
            json!({ "refreshToken": session.refresh_token }),
        ))
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.message(), "Refresh token is expired or used");

    // The new one works, presented as a cookie
    let by_cookie = ctx
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/users/refresh-token")
                .header(header::COOKIE, format!("refreshToken={}", new_refresh))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(by_cookie.status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_without_token() {
    let ctx = setup().await;

    let response = ctx
        .send(empty_request("POST", "/api/v1/users/refresh-token", None))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let forged = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/refresh-token",
            None,
            json!({ "refreshToken": "forged" }),
        ))
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
    assert_eq!(forged.message(), "Invalid refresh token");
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let ctx = setup().await;
    let session = ctx.sign_up("amy").await;

    let logout = ctx.post_empty("/api/v1/users/logout", &session).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.message(), "User logged out");
    let cookies = logout.set_cookies();
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

    let refresh = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/refresh-token",
            None,
            json!({ "refreshToken": session.refresh_token }),
        ))
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let ctx = setup().await;
    let session = ctx.sign_up("amy").await;

    let wrong = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/change-password",
            Some(&session.access_token),
            json!({ "oldPassword": "wrong", "newPassword": "new-password-1" }),
        ))
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.message(), "Invalid old password");

    let changed = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/change-password",
            Some(&session.access_token),
            json!({ "oldPassword": PASSWORD, "newPassword": "new-password-1" }),
        ))
        .await;
    assert_eq!(changed.status, StatusCode::OK);

    let old_login = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "amy", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(old_login.status, StatusCode::UNAUTHORIZED);

    let new_login = ctx
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "amy", "password": "new-password-1" }),
        ))
        .await;
    assert_eq!(new_login.status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_account_details() {
    let ctx = setup().await;
    let amy = ctx.sign_up("amy").await;
    ctx.register("bob").await;

    let incomplete = ctx
        .send(json_request(
            "PATCH",
            "/api/v1/users/update-user",
            Some(&amy.access_token),
            json!({ "fullName": "Amy Pond" }),
        ))
        .await;
    assert_eq!(incomplete.status, StatusCode::BAD_REQUEST);
    assert_eq!(incomplete.message(), "All fields are required");

    let taken = ctx
        .send(json_request(
            "PATCH",
            "/api/v1/users/update-user",
            Some(&amy.access_token),
            json!({ "fullName": "Amy Pond", "email": "bob@example.com" }),
        ))
        .await;
    assert_eq!(taken.status, StatusCode::CONFLICT);

    let updated = ctx
        .send(json_request(
            "PATCH",
            "/api/v1/users/update-user",
            Some(&amy.access_token),
            json!({ "fullName": "Amy Pond", "email": "Pond@Example.com" }),
        ))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.data()["fullName"], "Amy Pond");
    assert_eq!(updated.data()["email"], "pond@example.com");
}

#[tokio::test]
async fn test_update_avatar_replaces_old_asset() {
    let ctx = setup().await;
    let session = ctx.sign_up("amy").await;
    let before = ctx.get("/api/v1/users/current-user", &session).await;
    let old_url = before.data()["avatar"]["url"].as_str().unwrap().to_string();

    let response = ctx
        .send(multipart_request(
            "PATCH",
            "/api/v1/users/update-avatar",
            Some(&session.access_token),
            &[],
            &[("avatar", "new.png", "new png bytes")],
        ))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_ne!(response.data()["avatar"]["url"], old_url.as_str());
    // Old avatar deleted, new one stored
    assert_eq!(file_count(&ctx.media_dir()), 1);
}

#[tokio::test]
async fn test_update_cover_image_requires_file() {
    let ctx = setup().await;
    let session = ctx.sign_up("amy").await;

    let missing = ctx
        .send(multipart_request(
            "PATCH",
            "/api/v1/users/update-coverImg",
            Some(&session.access_token),
            &[("note", "no file attached")],
            &[],
        ))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let set = ctx
        .send(multipart_request(
            "PATCH",
            "/api/v1/users/update-coverImg",
            Some(&session.access_token),
            &[],
            &[("coverImage", "cover.jpg", "jpg")],
        ))
        .await;
    assert_eq!(set.status, StatusCode::OK);
    assert!(set.data()["coverImage"]["url"].is_string());
}

#[tokio::test]
async fn test_channel_profile_counts() {
    let ctx = setup().await;
    let amy = ctx.sign_up("amy").await;
    let bob = ctx.sign_up("bob").await;

    let toggled = ctx
        .post_empty(&format!("/api/v1/subscriptions/c/{}", amy.user_id), &bob)
        .await;
    assert_eq!(toggled.status, StatusCode::OK);

    let seen_by_bob = ctx.get("/api/v1/users/c/amy", &bob).await;
    assert_eq!(seen_by_bob.status, StatusCode::OK);
    assert_eq!(seen_by_bob.data()["subscribersCount"], 1);
    assert_eq!(seen_by_bob.data()["channelsSubscribedToCount"], 0);
    assert_eq!(seen_by_bob.data()["isSubscribed"], true);

    let seen_by_amy = ctx.get("/api/v1/users/c/bob", &amy).await;
    assert_eq!(seen_by_amy.data()["channelsSubscribedToCount"], 1);
    assert_eq!(seen_by_amy.data()["isSubscribed"], false);

    let missing = ctx.get("/api/v1/users/c/nobody", &amy).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.message(), "Channel does not exist");
}

#[tokio::test]
async fn test_watch_history_most_recent_first() {
    let ctx = setup().await;
    let amy = ctx.sign_up("amy").await;
    let first = ctx.publish_video(&amy, "First").await;
    let second = ctx.publish_video(&amy, "Second").await;

    for id in [&first, &second, &first] {
        let response = ctx.get(&format!("/api/v1/videos/{}", id), &amy).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let history = ctx.get("/api/v1/users/history", &amy).await;
    assert_eq!(history.status, StatusCode::OK);
    let entries = history.data().as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["id"], first.as_str());
    assert_eq!(entries[1]["id"], second.as_str());
    assert_eq!(entries[0]["owner"]["username"], "amy");
}
