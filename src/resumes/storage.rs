use crate::services::aws::AWSError;
use crate::services::AWSService;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object storage error: {0}")]
    Backend(#[from] AWSError),

    #[error("File storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Binary artifact storage keyed by a generated storage key
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `data` under `key` and returns the artifact URL
    async fn put(&self, data: Bytes, key: &str, content_type: &str) -> Result<String, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// URL that grants read access for roughly `ttl`
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;
}

/// Longest name segment kept in a storage key. Keeps file names under 255 bytes.
pub const MAX_KEY_NAME_CHARS: usize = 100;

/// `resumes/<sanitized lowercase name>_<millis>.pdf`
pub fn storage_key(name: &str, now_millis: i64) -> String {
    let sanitized: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' })
        .take(MAX_KEY_NAME_CHARS)
        .collect();

    let base = if sanitized.chars().all(|c| c == '_') {
        "resume"
    } else {
        sanitized.as_str()
    };

    format!("resumes/{}_{}.pdf", base, now_millis)
}

pub struct S3ArtifactStore {
    aws_service: Arc<AWSService>,
}

impl S3ArtifactStore {
    pub fn new(aws_service: Arc<AWSService>) -> Self {
        Self { aws_service }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(&self, data: Bytes, key: &str, content_type: &str) -> Result<String, StorageError> {
        Ok(self.aws_service.upload_file(data, key, content_type).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        Ok(self.aws_service.delete_file(key).await?)
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        Ok(self.aws_service.presigned_get_url(key, ttl).await?)
    }
}

/// Stores artifacts flat under `root`, served back through `/api/files/resumes/:filename`
pub struct LocalArtifactStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Last path segment of `key`, rejecting anything that could escape `root`
    pub fn file_name(key: &str) -> Result<&str, StorageError> {
        let name = key.rsplit('/').next().unwrap_or(key);
        if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(name)
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(Self::file_name(key)?))
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/api/files/resumes/{}", self.public_base_url, file_name)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, data: Bytes, key: &str, _content_type: &str) -> Result<String, StorageError> {
        let file_name = Self::file_name(key)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(file_name), &data).await?;

        info!(key = %key, bytes = data.len(), "Resume stored on local disk");
        Ok(self.url_for(file_name))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn signed_url(&self, key: &str, _ttl: Duration) -> Result<String, StorageError> {
        Ok(self.url_for(Self::file_name(key)?))
    }
}
