use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{describe_transport_error, WordPressClient, MEDIA_PATH};
use crate::error::AppError;

/// An uploaded file staged on local disk under a random name.
///
/// The file is removed when the value is dropped, whatever happened to the
/// upload in between.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    file_name: String,
    content_type: String,
}

impl StagedUpload {
    /// Create an empty, uniquely named file in `dir` for an upload called `file_name`.
    pub async fn reserve(dir: &Path, file_name: &str, content_type: &str) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let file_name = sanitize_file_name(file_name);
        let extension = Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let path = dir.join(format!("{}{}", Uuid::new_v4().simple(), extension));

        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        debug!("staged upload {} at {}", file_name, path.display());

        Ok(Self {
            path,
            file_name,
            content_type: content_type.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::write(&self.path, bytes).await
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed staged upload {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove staged upload {}: {}", self.path.display(), e),
        }
    }
}

/// Result of a successful media upload
#[derive(Debug, Clone, Deserialize)]
pub struct MediaUploaded {
    pub id: i64,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl WordPressClient {
    /// Re-upload a staged file to the WordPress media library.
    pub async fn upload_media(&self, staged: &StagedUpload) -> Result<MediaUploaded, AppError> {
        let bytes = tokio::fs::read(staged.path()).await.map_err(|e| {
            error!("Failed to read staged upload {}: {}", staged.path().display(), e);
            AppError::upstream(format!("An unexpected error occurred: {}", e))
        })?;

        let url = self.endpoint(MEDIA_PATH);
        info!("Proxying image upload to WordPress: {} for file {}", url, staged.file_name());

        let request = self
            .http()
            .post(&url)
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", staged.file_name()),
            )
            .header("Content-Type", staged.content_type())
            .body(bytes);

        let response = self.with_basic_auth(request).send().await.map_err(|e| {
            let detail = describe_transport_error(&e);
            error!("Error connecting to WordPress for image upload: {}", detail);
            AppError::upstream(format!("Failed to connect to WordPress: {}", detail))
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            error!("WordPress media upload failed with status {}: {}", status, body);
            // Passing a 2xx through would read as success to the caller
            if status.is_success() {
                return Err(AppError::upstream(format!(
                    "WordPress upload failed: unexpected status {}",
                    status.as_u16()
                )));
            }
            return Err(AppError::Remote {
                status: status.as_u16(),
                detail: format!("WordPress upload failed: {}", body),
            });
        }

        let uploaded: MediaUploaded = response.json().await.map_err(|e| {
            error!("Failed to parse WordPress media response: {}", e);
            AppError::upstream("WordPress returned an unreadable media response")
        })?;
        info!("Image uploaded to WordPress successfully. Media ID: {}", uploaded.id);
        Ok(uploaded)
    }
}

/// Keep a header-safe file name: visible ASCII without quotes or path separators.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            '"' | ';' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_paths_and_non_ascii() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("फोटो.jpg"), "____.jpg");
        assert_eq!(sanitize_file_name("a\"b;c.png"), "a_b_c.png");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
    }

    #[tokio::test]
    async fn staged_file_keeps_extension_and_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedUpload::reserve(dir.path(), "photo.JPG", "image/jpeg").await.unwrap();
        let path = staged.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("JPG"));
        staged.write(b"jpeg bytes").await.unwrap();

        drop(staged);
        assert!(!path.exists());
    }
}
