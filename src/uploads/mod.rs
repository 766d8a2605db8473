use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::ApiError;

/// Image mime types accepted for upload, with the extensions each may carry.
const ALLOWED_TYPES: &[(&str, &[&str])] = &[
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/webp", &["webp"]),
    ("image/gif", &["gif"]),
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("file extension .{extension} does not match declared type {mime}")]
    ExtensionMismatch { extension: String, mime: String },
    #[error("file of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(e) => ApiError::storage(e.to_string()),
            other => ApiError::validation(other.to_string()),
        }
    }
}

/// Metadata for a file persisted to the upload directory.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Public reference, e.g. `/uploads/1718000000000-9f2c....jpg`.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub size: u64,
}

/// Writes uploads to a single shared directory and serves deletions against
/// it. Stored names are generated, never taken from the client.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    public_prefix: String,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            public_prefix: config.public_prefix.clone(),
            max_bytes: config.max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it does not exist yet. Called once at
    /// startup, before the first write.
    pub async fn ensure_dir(&self) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Validate and persist one uploaded file, returning its stored location.
    pub async fn store(
        &self,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, UploadError> {
        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let extension = self.checked_extension(original_name, content_type)?;
        let stored_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        );
        let absolute_path = self.dir.join(&stored_name);

        tokio::fs::write(&absolute_path, bytes).await?;
        debug!(path = %absolute_path.display(), size = bytes.len(), "stored upload");

        Ok(StoredFile {
            relative_path: format!("{}/{}", self.public_prefix, stored_name),
            absolute_path,
            size: bytes.len() as u64,
        })
    }

    /// Idempotent delete. Returns false, without erroring, when the file is
    /// already absent or the path does not belong to the upload directory.
    pub async fn remove(&self, relative_path: &str) -> bool {
        let Some(path) = self.resolve(relative_path) else {
            warn!(relative_path, "refusing to delete path outside upload dir");
            return false;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "deleted upload");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to delete upload");
                false
            }
        }
    }

    /// Whether the referenced file is present on disk.
    pub async fn exists(&self, relative_path: &str) -> bool {
        match self.resolve(relative_path) {
            Some(path) => tokio::fs::metadata(&path).await.is_ok(),
            None => false,
        }
    }

    /// Map a public reference back to a file inside the upload directory.
    /// Anything that is not a bare file name under the prefix is rejected.
    fn resolve(&self, relative_path: &str) -> Option<PathBuf> {
        let name = relative_path
            .strip_prefix(&self.public_prefix)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(relative_path);

        let candidate = Path::new(name);
        if name.is_empty() || candidate.file_name() != Some(candidate.as_os_str()) {
            return None;
        }
        Some(self.dir.join(name))
    }

    fn checked_extension(
        &self,
        original_name: &str,
        content_type: &str,
    ) -> Result<String, UploadError> {
        let Some((_, extensions)) = ALLOWED_TYPES
            .iter()
            .find(|(mime, _)| *mime == content_type)
        else {
            return Err(UploadError::UnsupportedType(content_type.to_string()));
        };

        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension {
            Some(ext) if extensions.contains(&ext.as_str()) => Ok(ext),
            // No extension on the original name: fall back to the canonical one.
            None => Ok(extensions[0].to_string()),
            Some(ext) => Err(UploadError::ExtensionMismatch {
                extension: ext,
                mime: content_type.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;

    fn store_in(dir: &Path) -> UploadStore {
        UploadStore::new(&UploadConfig {
            dir: dir.to_path_buf(),
            public_prefix: "/uploads".to_string(),
            max_bytes: 1024,
        })
    }

    #[tokio::test]
    async fn store_then_remove_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dir().await.unwrap();

        let file = store
            .store("photo.JPG", "image/jpeg", b"not really a jpeg")
            .await
            .unwrap();

        assert!(file.relative_path.starts_with("/uploads/"));
        assert!(file.relative_path.ends_with(".jpg"));
        assert_eq!(file.size, 17);
        assert!(store.exists(&file.relative_path).await);

        assert!(store.remove(&file.relative_path).await);
        assert!(!store.exists(&file.relative_path).await);
        // Second delete is idempotent, not an error.
        assert!(!store.remove(&file.relative_path).await);
    }

    #[tokio::test]
    async fn generated_names_ignore_the_client_filename() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dir().await.unwrap();

        let file = store
            .store("../../etc/passwd.png", "image/png", b"png")
            .await
            .unwrap();
        assert!(!file.relative_path.contains("passwd"));
        assert!(!file.relative_path.contains(".."));
        assert!(file.absolute_path.starts_with(tmp.path()));
    }

    #[tokio::test]
    async fn rejects_unsupported_mime() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dir().await.unwrap();

        let err = store
            .store("report.pdf", "application/pdf", b"%PDF")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn rejects_extension_mime_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dir().await.unwrap();

        let err = store
            .store("image.png", "image/jpeg", b"data")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::ExtensionMismatch { .. }));
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dir().await.unwrap();

        let big = vec![0u8; 2048];
        let err = store.store("big.png", "image/png", &big).await.unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn remove_refuses_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.ensure_dir().await.unwrap();

        assert!(!store.remove("/uploads/../outside.txt").await);
        assert!(!store.remove("/etc/passwd").await);
    }
}
