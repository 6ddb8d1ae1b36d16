//! Media relay: forwards staged uploads to the media host.
//!
//! Two backends are supported:
//! - Cloudinary (signed REST uploads, production)
//! - A local directory served under `/media` (development and tests)
//!
//! The staged local file is always removed after an upload attempt, whether
//! the host accepted it or not. Deletion is best-effort and never fails the
//! caller.

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use url::Url;

pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com";

/// Stable reference to an asset on the media host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub public_id: String,
    pub url: String,
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub media: MediaRef,
    /// Playback length in seconds, reported by the host for audio/video
    pub duration: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("failed to access staged file: {0}")]
    Io(#[from] std::io::Error),
    #[error("media host request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("media host rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("unrecognised media reference: {0}")]
    UnknownReference(String),
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// API origin, overridable for tests against a stub host
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub enum MediaBackend {
    Cloudinary(CloudinaryConfig),
    LocalDir { root: PathBuf, base_url: String },
}

#[derive(Deserialize)]
struct CloudinaryUpload {
    public_id: String,
    secure_url: String,
    duration: Option<f64>,
}

#[derive(Deserialize)]
struct CloudinaryDestroy {
    result: String,
}

#[derive(Clone)]
pub struct MediaRelay {
    backend: MediaBackend,
    client: reqwest::Client,
}

impl MediaRelay {
    pub fn new(backend: MediaBackend) -> Self {
        Self {
            backend,
            client: reqwest::Client::new(),
        }
    }

    /// Directory to serve under `/media` when the local backend is active.
    pub fn local_root(&self) -> Option<&Path> {
        match &self.backend {
            MediaBackend::LocalDir { root, .. } => Some(root),
            MediaBackend::Cloudinary(_) => None,
        }
    }

    /// Forward a staged file to the media host.
    ///
    /// Returns `Ok(None)` only when no path was given. The staged file is
    /// removed on both the success and the failure path.
    pub async fn upload(
        &self,
        local_path: Option<&Path>,
    ) -> Result<Option<UploadedMedia>, MediaError> {
        let Some(path) = local_path else {
            return Ok(None);
        };

        let result = match &self.backend {
            MediaBackend::Cloudinary(config) => self.upload_cloudinary(config, path).await,
            MediaBackend::LocalDir { root, base_url } => upload_local(root, base_url, path).await,
        };

        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
            }
        }

        match &result {
            Ok(uploaded) => info!(public_id = %uploaded.media.public_id, "Media uploaded"),
            Err(e) => warn!(path = %path.display(), error = %e, "Media upload failed"),
        }

        result.map(Some)
    }

    /// Delete an asset from the media host. Failures are logged, never returned.
    pub async fn delete(&self, media: &MediaRef) {
        let result = match &self.backend {
            MediaBackend::Cloudinary(config) => self.delete_cloudinary(config, media).await,
            MediaBackend::LocalDir { root, .. } => delete_local(root, &media.public_id).await,
        };

        match result {
            Ok(()) => debug!(public_id = %media.public_id, "Media deleted"),
            Err(e) => warn!(public_id = %media.public_id, error = %e, "Failed to delete media"),
        }
    }

    async fn upload_cloudinary(
        &self,
        config: &CloudinaryConfig,
        path: &Path,
    ) -> Result<UploadedMedia, MediaError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = unix_timestamp().to_string();
        let signature = sign_params(&[("timestamp", &timestamp)], &config.api_secret);

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name))
            .text("api_key", config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let url = format!(
            "{}/v1_1/{}/auto/upload",
            config.api_base, config.cloud_name
        );
        let response = self.client.post(url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: CloudinaryUpload = response.json().await?;
        Ok(UploadedMedia {
            media: MediaRef {
                public_id: uploaded.public_id,
                url: uploaded.secure_url,
            },
            duration: uploaded.duration,
        })
    }

    async fn delete_cloudinary(
        &self,
        config: &CloudinaryConfig,
        media: &MediaRef,
    ) -> Result<(), MediaError> {
        let resource_type = resource_type_from_url(&media.url).unwrap_or_else(|| "image".into());
        let timestamp = unix_timestamp().to_string();
        let signature = sign_params(
            &[("public_id", &media.public_id), ("timestamp", &timestamp)],
            &config.api_secret,
        );

        let url = format!(
            "{}/v1_1/{}/{}/destroy",
            config.api_base, config.cloud_name, resource_type
        );
        let response = self
            .client
            .post(url)
            .form(&[
                ("public_id", media.public_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("api_key", config.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let destroyed: CloudinaryDestroy = response.json().await?;
        if destroyed.result != "ok" {
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                body: destroyed.result,
            });
        }
        Ok(())
    }
}

async fn upload_local(
    root: &Path,
    base_url: &str,
    path: &Path,
) -> Result<UploadedMedia, MediaError> {
    tokio::fs::create_dir_all(root).await?;

    let public_id = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
        None => uuid::Uuid::new_v4().to_string(),
    };

    // Copy rather than rename: the staging dir may live on another filesystem.
    tokio::fs::copy(path, root.join(&public_id)).await?;

    Ok(UploadedMedia {
        media: MediaRef {
            url: format!("{}/{}", base_url.trim_end_matches('/'), public_id),
            public_id,
        },
        duration: None,
    })
}

async fn delete_local(root: &Path, public_id: &str) -> Result<(), MediaError> {
    if public_id.is_empty()
        || public_id.contains(['/', '\\'])
        || public_id.starts_with('.')
    {
        return Err(MediaError::UnknownReference(public_id.to_string()));
    }
    tokio::fs::remove_file(root.join(public_id)).await?;
    Ok(())
}

/// Cloudinary request signature: params sorted by key, joined as
/// `k=v&k=v`, secret appended, SHA-1 hex digest.
fn sign_params(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    hex::encode(Sha1::digest(format!("{}{}", joined, secret).as_bytes()))
}

/// Recover the resource type from a delivery URL of the form
/// `https://res.cloudinary.com/<cloud>/<resource_type>/upload/...`.
fn resource_type_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.collect();
    let upload_pos = segments.iter().position(|s| *s == "upload")?;
    if upload_pos == 0 {
        return None;
    }
    Some(segments[upload_pos - 1].to_string())
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
