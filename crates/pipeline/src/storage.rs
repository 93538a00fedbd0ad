//! Durable storage for downloaded videos.
//!
//! [`VideoStorage`] is the seam the runner writes through;
//! [`LocalVideoStorage`] keeps files on the local filesystem under random
//! collision-resistant names and exposes them under a public path prefix.

use std::path::{Path, PathBuf};

use lunara_core::classification::GenerationErrorCode;

/// Extension of every stored video.
const VIDEO_EXTENSION: &str = "mp4";

/// A file successfully written and verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVideo {
    /// Storage key (the generated file name).
    pub key: String,
    /// Location on disk.
    pub file_path: String,
    /// Public-facing URL path clients use to fetch the video.
    pub public_url: String,
    pub size_bytes: u64,
}

/// Storage failures, each mapping to a job error code.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to create storage directory: {0}")]
    Directory(#[source] std::io::Error),

    #[error("Failed to write video file: {0}")]
    Write(#[source] std::io::Error),

    /// The file is missing or empty after a successful write.
    #[error("Stored video failed verification: {0}")]
    Verification(String),
}

impl StorageError {
    pub fn code(&self) -> GenerationErrorCode {
        match self {
            Self::Directory(_) => GenerationErrorCode::DirectoryError,
            Self::Write(_) => GenerationErrorCode::WriteFailed,
            Self::Verification(_) => GenerationErrorCode::SaveFailed,
        }
    }
}

/// Storage backend for generated videos.
#[async_trait::async_trait]
pub trait VideoStorage: Send + Sync {
    /// Write `data` under a fresh name and verify it landed intact.
    ///
    /// On verification failure the partial file is removed before the
    /// error is returned.
    async fn write(&self, data: &[u8]) -> Result<StoredVideo, StorageError>;

    async fn exists(&self, key: &str) -> bool;

    /// Size in bytes, or `None` if the file is missing.
    async fn size(&self, key: &str) -> Option<u64>;

    /// Remove a stored file. Missing files are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    fn public_url(&self, key: &str) -> String;
}

/// Local filesystem storage backend.
pub struct LocalVideoStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalVideoStorage {
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    fn new_key() -> String {
        format!("{}.{VIDEO_EXTENSION}", uuid::Uuid::new_v4())
    }
}

#[async_trait::async_trait]
impl VideoStorage for LocalVideoStorage {
    async fn write(&self, data: &[u8]) -> Result<StoredVideo, StorageError> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(StorageError::Directory)?;

        let key = Self::new_key();
        let path = self.path_for(&key);

        tokio::fs::write(&path, data)
            .await
            .map_err(StorageError::Write)?;

        let size = match self.size(&key).await {
            Some(size) if size > 0 => size,
            observed => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(StorageError::Verification(match observed {
                    Some(_) => format!("{key} is empty"),
                    None => format!("{key} is missing"),
                }));
            }
        };

        Ok(StoredVideo {
            public_url: self.public_url(&key),
            file_path: path.to_string_lossy().into_owned(),
            key,
            size_bytes: size,
        })
    }

    async fn exists(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .unwrap_or(false)
    }

    async fn size(&self, key: &str) -> Option<u64> {
        tokio::fs::metadata(self.path_for(key))
            .await
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Write(e)),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn write_creates_directory_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalVideoStorage::new(dir.path().join("videos"), "/media/videos/");

        let stored = storage.write(b"fake mp4 bytes").await.unwrap();

        assert!(stored.key.ends_with(".mp4"));
        assert_eq!(stored.size_bytes, 14);
        assert_eq!(stored.public_url, format!("/media/videos/{}", stored.key));
        assert!(storage.exists(&stored.key).await);
        assert_eq!(storage.size(&stored.key).await, Some(14));
    }

    #[tokio::test]
    async fn names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalVideoStorage::new(dir.path(), "/media/videos");

        let a = storage.write(b"a").await.unwrap();
        let b = storage.write(b"b").await.unwrap();
        assert_ne!(a.key, b.key);
    }

    #[tokio::test]
    async fn empty_write_fails_verification_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalVideoStorage::new(dir.path(), "/media/videos");

        let err = storage.write(b"").await.unwrap_err();
        assert_matches!(err, StorageError::Verification(_));
        assert_eq!(err.code(), GenerationErrorCode::SaveFailed);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unusable_directory_is_a_directory_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let storage = LocalVideoStorage::new(blocker.join("videos"), "/media/videos");

        let err = storage.write(b"data").await.unwrap_err();
        assert_eq!(err.code(), GenerationErrorCode::DirectoryError);
    }

    #[tokio::test]
    async fn delete_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalVideoStorage::new(dir.path(), "/media/videos");
        storage.delete("nope.mp4").await.unwrap();
    }
}
