//! Configuration module
//!
//! Process-level settings read from the environment: where runs stage their
//! files, which storage backend to talk to, and where the ffmpeg tools live.
//! Per-media handler options are not environment driven, see
//! `mediaflow_processing::HandlerProfiles`.

use std::env;
use std::path::PathBuf;

use crate::storage_types::StorageBackend;

const DEFAULT_ACL: &str = "private";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_FFPROBE_PATH: &str = "ffprobe";

#[derive(Clone, Debug)]
pub struct Config {
    /// Root under which each run creates its own `{uuid}` directory
    pub tmp_dir_root: PathBuf,
    pub storage_backend: StorageBackend,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub local_storage_path: Option<String>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub default_acl: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production).
    pub fn from_vars<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::S3,
        };

        let tmp_dir_root = lookup("MEDIAFLOW_TMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("mediaflow"));

        let config = Config {
            tmp_dir_root,
            storage_backend,
            s3_region: lookup("S3_REGION").or_else(|| lookup("AWS_REGION")),
            s3_endpoint: lookup("S3_ENDPOINT"),
            local_storage_path: lookup("LOCAL_STORAGE_PATH"),
            ffmpeg_path: lookup("FFMPEG_PATH").unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string()),
            ffprobe_path: lookup("FFPROBE_PATH")
                .unwrap_or_else(|| DEFAULT_FFPROBE_PATH.to_string()),
            default_acl: lookup("DEFAULT_ACL").unwrap_or_else(|| DEFAULT_ACL.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::S3 if self.s3_region.is_none() => Err(anyhow::anyhow!(
                "S3_REGION or AWS_REGION must be set for the s3 storage backend"
            )),
            StorageBackend::Local if self.local_storage_path.is_none() => Err(anyhow::anyhow!(
                "LOCAL_STORAGE_PATH must be set for the local storage backend"
            )),
            _ => Ok(()),
        }
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.local_storage_path.as_deref()
    }
}
