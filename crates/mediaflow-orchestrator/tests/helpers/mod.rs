//! Shared fixtures for run tests: an in-memory object store and event builders.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use mediaflow_core::StorageBackend;
use mediaflow_storage::{ObjectMetadata, ObjectStorage, StorageError, StorageResult};
use serde_json::json;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

/// One recorded `put_object` call
#[derive(Debug, Clone)]
pub struct Upload {
    pub bucket: String,
    pub key: String,
    pub acl: String,
    pub metadata: ObjectMetadata,
    pub bytes: Vec<u8>,
}

/// In-memory storage; uploads whose key contains `fail_on` are rejected.
#[derive(Default)]
pub struct MockStorage {
    objects: Mutex<HashMap<(String, String), (Vec<u8>, ObjectMetadata)>>,
    uploads: Mutex<Vec<Upload>>,
    fail_on: Mutex<Option<String>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, bytes: Vec<u8>, metadata: ObjectMetadata) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), (bytes, metadata));
    }

    pub fn fail_uploads_containing(&self, fragment: &str) {
        *self.fail_on.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> StorageResult<ObjectMetadata> {
        let found = self
            .objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned();
        let (bytes, metadata) = found.ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        tokio::fs::write(destination, bytes).await?;
        Ok(metadata)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        acl: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        let rejected = self
            .fail_on
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|fragment| key.contains(fragment));
        if rejected {
            return Err(StorageError::UploadFailed(format!("rejected {}", key)));
        }

        let bytes = tokio::fs::read(local_path).await?;
        self.uploads.lock().unwrap().push(Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            acl: acl.to_string(),
            metadata: metadata.clone(),
            bytes,
        });
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Wrap storage records the way the notification service delivers them.
pub fn event_with_records(records: Vec<serde_json::Value>) -> String {
    let message = json!({ "Records": records }).to_string();
    json!({
        "Records": [{
            "EventSource": "aws:sns",
            "Sns": { "Message": message }
        }]
    })
    .to_string()
}

pub fn s3_record(bucket: &str, key: &str, size: usize) -> serde_json::Value {
    json!({
        "s3": {
            "bucket": { "name": bucket },
            "object": { "key": key, "size": size }
        }
    })
}

pub fn event(bucket: &str, key: &str, size: usize) -> String {
    event_with_records(vec![s3_record(bucket, key, size)])
}

/// PNG bytes of a solid `width`x`height` image
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 90])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}
