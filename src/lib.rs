pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod media;
pub mod password;

use api::create_api_router;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use db::Database;
use jwt::JwtConfig;
use media::{MediaBackend, MediaRelay};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub access_token_secret: Vec<u8>,
    /// Secret for signing refresh tokens
    pub refresh_token_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_token_duration: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_duration: u64,
    /// Where uploaded files end up
    pub media: MediaBackend,
    /// Scratch directory for multipart uploads before they are relayed
    pub upload_dir: PathBuf,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Allowed browser origin. `None` allows any origin without credentials.
    pub cors_origin: Option<String>,
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true),
        Some(Err(e)) => {
            warn!(error = %e, "Ignoring invalid CORS origin");
            layer.allow_origin(AllowOrigin::any())
        }
        None => layer.allow_origin(AllowOrigin::any()),
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::with_durations(
        &config.access_token_secret,
        &config.refresh_token_secret,
        config.access_token_duration,
        config.refresh_token_duration,
    ));
    let media = Arc::new(MediaRelay::new(config.media.clone()));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        media.clone(),
        Arc::new(config.upload_dir.clone()),
        config.secure_cookies,
    );

    let mut app = Router::new().nest("/api/v1", api_router);

    // Local backend: uploaded files are served straight from disk
    if let Some(root) = media.local_root() {
        app = app.nest_service("/media", ServeDir::new(root));
    }

    app.layer(cors_layer(config.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    if let Err(e) = tokio::fs::create_dir_all(&config.upload_dir).await {
        tracing::error!(path = %config.upload_dir.display(), error = %e, "Failed to create upload directory");
        return Err(e);
    }
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
