#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tower::ServiceExt;
use vidtube::{ServerConfig, create_app, db::Database, media::MediaBackend};

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct horse battery staple";

const BOUNDARY: &str = "vidtube-test-boundary";

/// An app over an in-memory database with media stored in a scratch
/// directory. The directory is removed when the context is dropped.
pub struct TestContext {
    pub app: Router,
    pub db: Database,
    pub root: PathBuf,
}

impl TestContext {
    pub fn media_dir(&self) -> PathBuf {
        self.root.join("media")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Send a request and decode the JSON envelope.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            json,
        }
    }

    /// Register through the API with an avatar and return the public user object.
    pub async fn register(&self, username: &str) -> Value {
        let full_name = format!("{} Example", username);
        let email = format!("{}@example.com", username);
        let response = self
            .send(multipart_request(
                "POST",
                "/api/v1/users/register",
                None,
                &[
                    ("fullName", full_name.as_str()),
                    ("email", email.as_str()),
                    ("username", username),
                    ("password", PASSWORD),
                ],
                &[("avatar", "avatar.png", "fake png bytes")],
            ))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.json);
        response.json["data"].clone()
    }

    pub async fn login(&self, username: &str) -> Session {
        let response = self
            .send(json_request(
                "POST",
                "/api/v1/users/login",
                None,
                json!({ "username": username, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.json);
        let data = &response.json["data"];
        Session {
            user_id: data["user"]["id"].as_str().unwrap().to_string(),
            access_token: data["accessToken"].as_str().unwrap().to_string(),
            refresh_token: data["refreshToken"].as_str().unwrap().to_string(),
        }
    }

    /// Register and log in.
    pub async fn sign_up(&self, username: &str) -> Session {
        self.register(username).await;
        self.login(username).await
    }

    /// Publish a video as `session` and return its public id.
    pub async fn publish_video(&self, session: &Session, title: &str) -> String {
        let response = self
            .send(multipart_request(
                "POST",
                "/api/v1/videos",
                Some(&session.access_token),
                &[("title", title), ("description", "A test video")],
                &[
                    ("videoFile", "clip.mp4", "fake mp4 bytes"),
                    ("thumbnail", "thumb.jpg", "fake jpg bytes"),
                ],
            ))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.json);
        response.json["data"]["id"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, uri: &str, session: &Session) -> TestResponse {
        self.send(empty_request("GET", uri, Some(&session.access_token)))
            .await
    }

    pub async fn post_empty(&self, uri: &str, session: &Session) -> TestResponse {
        self.send(empty_request("POST", uri, Some(&session.access_token)))
            .await
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.json["data"]
    }

    pub fn message(&self) -> &str {
        self.json["message"].as_str().unwrap_or_default()
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }
}

/// Configuration for a server whose media and staging dirs live under `root`.
pub fn test_config(db: Database, root: &Path) -> ServerConfig {
    ServerConfig {
        db,
        access_token_secret: ACCESS_SECRET.to_vec(),
        refresh_token_secret: REFRESH_SECRET.to_vec(),
        access_token_duration: 60 * 60,
        refresh_token_duration: 24 * 60 * 60,
        media: MediaBackend::LocalDir {
            root: root.join("media"),
            base_url: "http://localhost/media".to_string(),
        },
        upload_dir: root.join("temp"),
        secure_cookies: false,
        cors_origin: None,
    }
}

pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("vidtube-test-{}", uuid::Uuid::new_v4()))
}

pub async fn setup() -> TestContext {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");

    let root = scratch_dir();
    let config = test_config(db.clone(), &root);

    TestContext {
        app: create_app(&config),
        db,
        root,
    }
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build a multipart/form-data request by hand.
/// `files` entries are (field name, file name, contents).
pub fn multipart_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    files: &[(&str, &str, &str)],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, contents) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

/// Number of regular files directly inside `dir`; zero if it does not exist.
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}
