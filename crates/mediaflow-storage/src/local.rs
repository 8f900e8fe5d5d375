use crate::keys::validate_segment;
use crate::traits::{ObjectMetadata, ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const SIDECAR_SUFFIX: &str = ".meta.json";

/// ACL and metadata kept next to each stored file
#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    acl: String,
    #[serde(default)]
    metadata: ObjectMetadata,
}

/// Local filesystem storage implementation
///
/// Buckets are directories under `base_path`; each object is stored at
/// `{base_path}/{bucket}/{key}` with a `{key}.meta.json` sidecar.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for bucket directories (e.g., "/var/lib/mediaflow")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert bucket and key to a filesystem path with security validation
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        validate_segment("bucket", bucket)?;
        if bucket.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "bucket must be a single path segment: {}",
                bucket
            )));
        }
        validate_segment("key", key)?;

        let path = self.base_path.join(bucket).join(key);
        if !path.starts_with(&self.base_path) {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }
        Ok(path)
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    async fn read_sidecar(path: &Path) -> StorageResult<Sidecar> {
        match fs::read(Self::sidecar_path(path)).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                StorageError::DownloadFailed(format!(
                    "Corrupt metadata sidecar for {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Sidecar::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// ACL recorded for a stored object
    pub async fn acl(&self, bucket: &str, key: &str) -> StorageResult<String> {
        let path = self.object_path(bucket, key)?;
        Ok(Self::read_sidecar(&path).await?.acl)
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> StorageResult<ObjectMetadata> {
        let path = self.object_path(bucket, key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
        }

        let size = fs::copy(&path, destination).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to copy {} to {}: {}",
                path.display(),
                destination.display(),
                e
            ))
        })?;

        let sidecar = Self::read_sidecar(&path).await?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(sidecar.metadata)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        acl: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        let start = std::time::Instant::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let size = fs::copy(local_path, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to copy {} to {}: {}",
                local_path.display(),
                path.display(),
                e
            ))
        })?;

        let sidecar = Sidecar {
            acl: acl.to_string(),
            metadata: metadata.clone(),
        };
        let raw = serde_json::to_vec_pretty(&sidecar)
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        fs::write(Self::sidecar_path(&path), raw)
            .await
            .map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write metadata for {}: {}",
                    path.display(),
                    e
                ))
            })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            acl = %acl,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
