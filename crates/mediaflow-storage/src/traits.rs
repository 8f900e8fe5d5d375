//! Storage abstraction trait
//!
//! This module defines the ObjectStorage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// User metadata attached to an object (`x-amz-meta-*` on S3)
pub type ObjectMetadata = HashMap<String, String>;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// The orchestrator owns one `Arc<dyn ObjectStorage>` for the whole run and
/// only ever moves whole files between the run directory and the backend.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Download `bucket/key` to `destination`, returning the object's user metadata.
    ///
    /// The destination's parent directory must already exist.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> StorageResult<ObjectMetadata>;

    /// Upload the file at `local_path` to `bucket/key` with a canned ACL and user metadata.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        acl: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
