use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dimension::Dimension;

/// Media families a handler can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    /// Top-level type of a mime string (`video/mp4` → `Video`).
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type.split('/').next()? {
            "image" => Some(MediaKind::Image),
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// One produced artifact, as reported in the notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantResult {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// File name inside the run directory
    pub name: String,
    pub format: String,
    pub size: u64,
    pub is_original: bool,
    /// Destination key, stamped once uploaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl VariantResult {
    pub fn image(name: String, format: String, size: u64, dimension: Dimension) -> Self {
        Self {
            kind: MediaKind::Image,
            name,
            format,
            size,
            is_original: false,
            path: None,
            dimension: Some(dimension),
            duration: None,
        }
    }

    pub fn audio(name: String, format: String, size: u64, duration: Option<f64>) -> Self {
        Self {
            kind: MediaKind::Audio,
            name,
            format,
            size,
            is_original: false,
            path: None,
            dimension: None,
            duration,
        }
    }

    pub fn video(
        name: String,
        format: String,
        size: u64,
        dimension: Dimension,
        duration: Option<f64>,
    ) -> Self {
        Self {
            kind: MediaKind::Video,
            name,
            format,
            size,
            is_original: false,
            path: None,
            dimension: Some(dimension),
            duration,
        }
    }

    /// Mark as a passthrough of the unmodified source.
    pub fn into_original(mut self) -> Self {
        self.is_original = true;
        self
    }
}
