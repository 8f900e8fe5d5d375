use crate::{StorageError, StorageResult};
use std::path::Path;

/// Reject keys and bucket names that could escape a backend's namespace.
pub(crate) fn validate_segment(kind: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!("{} is empty", kind)));
    }
    if value.starts_with('/') || value.split('/').any(|part| part == "..") {
        return Err(StorageError::InvalidKey(format!(
            "{} contains invalid path segments: {}",
            kind, value
        )));
    }
    Ok(())
}

/// S3 keys are opaque: leading slashes and `..` parts are legal there.
pub(crate) fn validate_object_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key is empty".to_string()));
    }
    Ok(())
}

/// Content type for an uploaded artifact, from its file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "aac" => "audio/aac",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
