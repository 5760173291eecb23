//! Object storage seam
//!
//! Uploaded files and prepared training data are stored under
//! `/`-separated keys such as `users/{uid}/uploads/{name}`.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Blob store addressed by `/`-separated keys
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Store bytes under a key, replacing any existing object
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()>;

    /// Fetch an object
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// URI of a key as seen by the training service
    fn uri(&self, key: &str) -> String;
}

/// Reject empty keys, absolute keys and any `.`/`..`/empty segment
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`].
pub fn validate_key(key: &str) -> StoreResult<()> {
    let bad_segment = key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if key.is_empty() || bad_segment || key.contains(['\\', '\0']) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Filesystem-backed [`ObjectStore`] mirroring a bucket layout
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    bucket: String,
}

impl LocalObjectStore {
    /// Create store rooted at `root`, reporting URIs for `bucket`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io_error(parent, e))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::io_error(&path, e))?;
        tracing::debug!(key, path = %path.display(), "stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_of(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io_error(&path, e)),
        }
    }

    fn uri(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(validate_key("users/u1/uploads/data.csv").is_ok());
        for bad in ["", "/abs", "a//b", "a/../b", "./a", "a/", "a\\b", "a\0b"] {
            assert!(validate_key(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "bucket");

        store.put("users/u1/uploads/a.txt", b"hello".to_vec()).await.unwrap();
        let bytes = store.get("users/u1/uploads/a.txt").await.unwrap();

        assert_eq!(bytes.as_deref(), Some(&b"hello"[..]));
        assert!(dir.path().join("users/u1/uploads/a.txt").exists());
    }

    #[tokio::test]
    async fn missing_object_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "bucket");
        assert!(store.get("users/u1/uploads/none.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "bucket");
        let err = store.put("users/../../escape", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[test]
    fn uri_uses_bucket() {
        let store = LocalObjectStore::new("/tmp/x", "llm-tuner-platform");
        assert_eq!(
            store.uri("users/u1/training-data/"),
            "s3://llm-tuner-platform/users/u1/training-data/"
        );
    }
}
