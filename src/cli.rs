//! CLI argument parsing, validation, and startup helpers.

use std::path::PathBuf;

use crate::ServerConfig;
use crate::db::Database;
use crate::media::{CLOUDINARY_API_BASE, CloudinaryConfig, MediaBackend};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "vidtube", about = "Video sharing backend")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "vidtube.db")]
    pub database: String,

    /// Secret used to sign access tokens (at least 32 characters)
    #[arg(long, env = "ACCESS_TOKEN_SECRET", hide_env_values = true, value_parser = parse_secret)]
    pub access_token_secret: String,

    /// Access token lifetime, e.g. "15m" or "1d"
    #[arg(long, env = "ACCESS_TOKEN_EXPIRY", default_value = "1d", value_parser = parse_expiry)]
    pub access_token_expiry: u64,

    /// Secret used to sign refresh tokens (at least 32 characters)
    #[arg(long, env = "REFRESH_TOKEN_SECRET", hide_env_values = true, value_parser = parse_secret)]
    pub refresh_token_secret: String,

    /// Refresh token lifetime, e.g. "10d"
    #[arg(long, env = "REFRESH_TOKEN_EXPIRY", default_value = "10d", value_parser = parse_expiry)]
    pub refresh_token_expiry: u64,

    /// Browser origin allowed to call the API with credentials
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: Option<String>,

    #[arg(long, env = "CLOUDINARY_API_KEY", hide_env_values = true)]
    pub cloudinary_api_key: Option<String>,

    #[arg(long, env = "CLOUDINARY_API_SECRET", hide_env_values = true)]
    pub cloudinary_api_secret: Option<String>,

    /// Directory for uploaded media when Cloudinary is not configured
    #[arg(long, env = "MEDIA_DIR", default_value = "public/media")]
    pub media_dir: PathBuf,

    /// Public URL of this server, used to build local media URLs
    #[arg(long, env = "PUBLIC_URL", default_value = "http://localhost:8000")]
    pub public_url: String,

    /// Scratch directory for multipart uploads
    #[arg(long, env = "UPLOAD_TEMP_DIR", default_value = "public/temp")]
    pub upload_dir: PathBuf,

    /// Do not set the Secure flag on session cookies (plain HTTP development)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn parse_secret(s: &str) -> Result<String, String> {
    if s.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(format!(
            "secret is shorter than {} characters",
            MIN_TOKEN_SECRET_LENGTH
        ));
    }
    Ok(s.to_string())
}

/// Parse a lifetime like `3600`, `90s`, `15m`, `12h` or `10d` into seconds.
pub fn parse_expiry(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        Some(_) => (s, 's'),
        None => return Err("expiry is empty".to_string()),
    };

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        other => return Err(format!("unknown expiry unit '{}'", other)),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid expiry: {}", s))?;
    if value == 0 {
        return Err("expiry must be greater than zero".to_string());
    }

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("expiry is too large: {}", s))
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides the default `info` level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Pick the media backend. Cloudinary needs all three credentials; with none set the
/// local directory is used. Returns None and logs an error on a partial configuration.
pub fn media_backend(args: &Args) -> Option<MediaBackend> {
    match (
        &args.cloudinary_cloud_name,
        &args.cloudinary_api_key,
        &args.cloudinary_api_secret,
    ) {
        (Some(cloud_name), Some(api_key), Some(api_secret)) => {
            info!(cloud = %cloud_name, "Using Cloudinary media backend");
            Some(MediaBackend::Cloudinary(CloudinaryConfig {
                cloud_name: cloud_name.clone(),
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
                api_base: CLOUDINARY_API_BASE.to_string(),
            }))
        }
        (None, None, None) => {
            let base_url = match Url::parse(&args.public_url) {
                Ok(url) => format!("{}/media", url.as_str().trim_end_matches('/')),
                Err(e) => {
                    error!(url = %args.public_url, error = %e, "Invalid public URL");
                    return None;
                }
            };
            info!(dir = %args.media_dir.display(), "Using local media backend");
            Some(MediaBackend::LocalDir {
                root: args.media_dir.clone(),
                base_url,
            })
        }
        _ => {
            error!(
                "Cloudinary is partially configured. Set CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET together"
            );
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: Args, db: Database) -> Option<ServerConfig> {
    let media = media_backend(&args)?;

    Some(ServerConfig {
        db,
        access_token_secret: args.access_token_secret.into_bytes(),
        refresh_token_secret: args.refresh_token_secret.into_bytes(),
        access_token_duration: args.access_token_expiry,
        refresh_token_duration: args.refresh_token_expiry,
        media,
        upload_dir: args.upload_dir,
        secure_cookies: !args.insecure_cookies,
        cors_origin: args.cors_origin,
    })
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
