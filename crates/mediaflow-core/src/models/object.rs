use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{HandleError, HandleResult};

/// The source object of a run and its staged local copy.
///
/// `local_key` is a fresh identifier, never derived from the source key, so
/// variant files written next to the staged copy cannot collide.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescriptor {
    pub bucket: String,
    pub key: String,
    pub size: Option<u64>,
    pub remote_metadata: HashMap<String, String>,
    pub local_tmp_dir: PathBuf,
    pub local_key: String,
    pub detected_mime_type: Option<String>,
    pub root_extension: String,
}

impl ObjectDescriptor {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        size: Option<u64>,
        local_tmp_dir: impl Into<PathBuf>,
    ) -> HandleResult<Self> {
        let key = key.into();
        let root_extension = Self::root_extension_of(&key)?;

        Ok(Self {
            bucket: bucket.into(),
            key,
            size,
            remote_metadata: HashMap::new(),
            local_tmp_dir: local_tmp_dir.into(),
            local_key: Uuid::new_v4().to_string(),
            detected_mime_type: None,
            root_extension,
        })
    }

    /// Trailing dot-segment of the last path component of `key`.
    pub fn root_extension_of(key: &str) -> HandleResult<String> {
        let file_name = key.rsplit('/').next().unwrap_or(key);
        match file_name.rsplit_once('.') {
            Some((_, extension)) if !extension.is_empty() => Ok(extension.to_string()),
            _ => Err(HandleError::MissingExtension(key.to_string())),
        }
    }

    /// File name of the staged copy inside the run directory.
    pub fn local_file_name(&self) -> String {
        format!("{}.{}", self.local_key, self.root_extension)
    }

    pub fn local_path(&self) -> PathBuf {
        self.local_tmp_dir.join(self.local_file_name())
    }

    pub fn path_in_tmp(&self, name: impl AsRef<Path>) -> PathBuf {
        self.local_tmp_dir.join(name)
    }

    /// Detected mime type, empty until the type detection stage ran.
    pub fn mime_type(&self) -> &str {
        self.detected_mime_type.as_deref().unwrap_or_default()
    }

    /// Source key without its extension, e.g. `uploads/cat` for `uploads/cat.png`.
    pub fn key_stem(&self) -> &str {
        self.key
            .strip_suffix(&self.root_extension)
            .and_then(|k| k.strip_suffix('.'))
            .unwrap_or(&self.key)
    }

    /// Whether `format` names the same container as the source extension.
    pub fn is_root_format(&self, format: &str) -> bool {
        normalize_format(format) == normalize_format(&self.root_extension)
    }
}

/// Lowercase a format name and fold common aliases (`jpeg` → `jpg`, `tif` → `tiff`).
pub fn normalize_format(format: &str) -> String {
    match format.to_ascii_lowercase().as_str() {
        "jpeg" | "jpe" => "jpg".to_string(),
        "tif" => "tiff".to_string(),
        other => other.to_string(),
    }
}
