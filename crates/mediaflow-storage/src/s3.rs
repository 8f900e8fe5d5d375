use crate::keys::{content_type_for, validate_object_key};
use crate::traits::{ObjectMetadata, ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use std::path::Path;
use tokio::fs;

/// S3 storage implementation
///
/// Not bound to a bucket: the bucket comes from each storage event.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(region.clone()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = endpoint_url {
            // S3-compatible providers need path-style addressing
            let mut s3_config_builder = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .endpoint_url(endpoint)
                .region(config.region().cloned())
                .retry_config(retry_config)
                .force_path_style(true);
            if let Some(provider) = config.credentials_provider() {
                s3_config_builder = s3_config_builder.credentials_provider(provider);
            }
            Client::from_conf(s3_config_builder.build())
        } else {
            Client::new(&config)
        };

        tracing::info!(
            region = %region,
            endpoint_url = ?endpoint_url,
            "S3 storage initialized"
        );

        Ok(S3Storage { client })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    #[tracing::instrument(skip(self, destination), fields(bucket = %bucket, key = %key))]
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> StorageResult<ObjectMetadata> {
        validate_object_key(key)?;
        let start = std::time::Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) =>
                {
                    StorageError::NotFound(format!("{}/{}", bucket, key))
                }
                _ => {
                    tracing::error!(
                        error = %e,
                        bucket = %bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 download failed"
                    );
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let metadata = response.metadata().cloned().unwrap_or_default();

        let mut file = fs::File::create(destination).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to create file {}: {}",
                destination.display(),
                e
            ))
        })?;
        let mut body = response.body.into_async_read();
        let size = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        file.sync_all().await?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(metadata)
    }

    #[tracing::instrument(skip(self, local_path, metadata), fields(bucket = %bucket, key = %key))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        acl: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        validate_object_key(key)?;
        let start = std::time::Instant::now();

        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to open {}: {}",
                local_path.display(),
                e
            ))
        })?;
        let size = body.size_hint().0;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::from(acl))
            .set_metadata(Some(metadata.clone()))
            .content_type(content_type_for(local_path))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            acl = %acl,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
