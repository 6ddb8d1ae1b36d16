//! Multipart staging for file uploads.
//!
//! File parts are written to the upload directory before being handed to
//! the media relay. A `StagedFile` that is dropped without being handed off
//! removes its file, so a rejected request leaves nothing behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use tracing::{error, warn};

use super::error::ApiError;
use crate::media::{MediaRelay, UploadedMedia};

/// A file part written to the staging directory.
#[derive(Debug)]
pub struct StagedFile {
    path: Option<PathBuf>,
}

impl StagedFile {
    /// Give up ownership of the file; the caller becomes responsible for
    /// removing it.
    pub fn hand_off(mut self) -> Option<PathBuf> {
        self.path.take()
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove staged file");
                }
            }
        }
    }
}

/// Text fields and staged files of one multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, StagedFile>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<StagedFile> {
        self.files.remove(name)
    }
}

/// Extension of an uploaded file name, kept only if it is short and
/// alphanumeric.
fn safe_extension(file_name: &str) -> Option<&str> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Read every part of a multipart body. Parts with a file name are staged
/// under `dir`; empty file parts are ignored.
pub async fn read_multipart(
    mut multipart: Multipart,
    dir: &Path,
) -> Result<MultipartForm, ApiError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Invalid multipart data"))?
    {
        let name = field.name().unwrap_or("").to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field
                .text()
                .await
                .map_err(|_| ApiError::bad_request(format!("Failed to read {}", name)))?;
            form.fields.insert(name, text);
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|_| ApiError::bad_request(format!("Failed to read {}", name)))?;
        if data.is_empty() {
            continue;
        }

        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            error!(dir = %dir.display(), error = %e, "Failed to create upload directory");
            ApiError::internal("Failed to store upload")
        })?;

        let staged_name = match safe_extension(&file_name) {
            Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let path = dir.join(staged_name);

        // Registered before the write so a partial file is still cleaned up
        let staged = StagedFile {
            path: Some(path.clone()),
        };
        tokio::fs::write(&path, &data).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to stage upload");
            ApiError::internal("Failed to store upload")
        })?;

        form.files.insert(name, staged);
    }

    Ok(form)
}

/// Hand a staged file to the media relay. `what` names the asset in the
/// error message.
pub async fn relay_upload(
    media: &MediaRelay,
    file: Option<StagedFile>,
    what: &str,
) -> Result<Option<UploadedMedia>, ApiError> {
    let path = file.and_then(StagedFile::hand_off);
    media.upload(path.as_deref()).await.map_err(|e| {
        error!(error = %e, "Failed to upload {}", what);
        ApiError::internal(format!("Error while uploading {}", what))
    })
}
