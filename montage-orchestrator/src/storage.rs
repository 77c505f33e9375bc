//! Object storage
//!
//! Durable home of every artifact a node produces. Keys are relative paths
//! within a bucket.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key`, returning the key
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        bucket: &str,
    ) -> Result<String, StorageError>;

    /// Time-limited URL a provider can fetch the object from
    async fn presigned_url(
        &self,
        key: &str,
        bucket: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    /// Size in bytes, or `None` if the object does not exist
    async fn size(&self, key: &str, bucket: &str) -> Result<Option<u64>, StorageError>;
}

fn check_key(key: &str) -> Result<(), StorageError> {
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if key.is_empty() || escapes {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// =============================================================================
// Local Filesystem
// =============================================================================

/// Objects stored as files under `root/{bucket}/{key}`
///
/// "Presigned" URLs point at `public_url`, which is expected to serve `root`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        let public_url = public_url.into();
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn path(&self, key: &str, bucket: &str) -> Result<PathBuf, StorageError> {
        check_key(bucket)?;
        check_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        bucket: &str,
    ) -> Result<String, StorageError> {
        let path = self.path(key, bucket)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!(
            "Stored {}/{} ({} bytes, {})",
            bucket,
            key,
            bytes.len(),
            content_type
        );
        Ok(key.to_string())
    }

    async fn presigned_url(
        &self,
        key: &str,
        bucket: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        self.path(key, bucket)?;
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!(
            "{}/{}/{}?expires={}",
            self.public_url, bucket, key, expires
        ))
    }

    async fn size(&self, key: &str, bucket: &str) -> Result<Option<u64>, StorageError> {
        match tokio::fs::metadata(self.path(key, bucket)?).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// In-Memory
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str, bucket: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        bucket: &str,
    ) -> Result<String, StorageError> {
        check_key(key)?;
        self.objects.write().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(key.to_string())
    }

    async fn presigned_url(
        &self,
        key: &str,
        bucket: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        if self.get(key, bucket).await.is_none() {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(format!("memory://{}/{}?ttl={}", bucket, key, ttl.as_secs()))
    }

    async fn size(&self, key: &str, bucket: &str) -> Result<Option<u64>, StorageError> {
        Ok(self.get(key, bucket).await.map(|o| o.bytes.len() as u64))
    }
}
