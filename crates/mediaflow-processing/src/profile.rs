//! Handler profiles: one optional configuration per media kind, chosen by mime type.

use crate::audio::{AudioHandler, AudioHandlerConfig};
use crate::ffmpeg::FfmpegTools;
use crate::handler::MediaHandler;
use crate::image::{ImageHandler, ImageHandlerConfig};
use crate::video::{VideoHandler, VideoHandlerConfig};
use anyhow::{Context, Result};
use mediaflow_core::{MediaKind, ObjectDescriptor};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandlerProfiles {
    #[serde(default)]
    pub image: Option<ImageHandlerConfig>,
    #[serde(default)]
    pub audio: Option<AudioHandlerConfig>,
    #[serde(default)]
    pub video: Option<VideoHandlerConfig>,
}

impl HandlerProfiles {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid handler profile document")
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read handler profiles {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Handler for the descriptor's detected media kind, if a profile covers it.
    pub fn select(&self, descriptor: &ObjectDescriptor, tools: &FfmpegTools) -> Option<MediaHandler> {
        let kind = MediaKind::from_mime(descriptor.mime_type())?;
        let handler = match kind {
            MediaKind::Image => {
                ImageHandler::new(descriptor.clone(), self.image.clone()?).into()
            }
            MediaKind::Audio => {
                AudioHandler::new(descriptor.clone(), self.audio.clone()?, tools.clone()).into()
            }
            MediaKind::Video => {
                VideoHandler::new(descriptor.clone(), self.video.clone()?, tools.clone()).into()
            }
        };

        tracing::debug!(kind = %kind, mime_type = descriptor.mime_type(), "Handler selected");
        Some(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROFILES: &str = r#"{
        "image": {
            "allow_mime_types": ["image/jpeg", "image/png"],
            "dimensions": [{"width": 200, "height": 200, "keepAspectRatio": true}],
            "format": ["webp"]
        },
        "audio": {
            "allow_mime_types": ["audio/*"]
        }
    }"#;

    fn descriptor(dir: &TempDir, key: &str, mime: Option<&str>) -> ObjectDescriptor {
        let mut d = ObjectDescriptor::new("bucket", key, None, dir.path()).unwrap();
        d.detected_mime_type = mime.map(String::from);
        d
    }

    #[test]
    fn test_select_by_mime() {
        let dir = TempDir::new().unwrap();
        let profiles = HandlerProfiles::from_json(PROFILES).unwrap();
        let tools = FfmpegTools::default();

        let image = profiles
            .select(&descriptor(&dir, "a.png", Some("image/png")), &tools)
            .unwrap();
        assert_eq!(image.kind(), MediaKind::Image);
        assert!(image.validate());

        let audio = profiles
            .select(&descriptor(&dir, "a.mp3", Some("audio/mpeg")), &tools)
            .unwrap();
        assert_eq!(audio.kind(), MediaKind::Audio);
    }

    #[test]
    fn test_select_without_profile_or_mime() {
        let dir = TempDir::new().unwrap();
        let profiles = HandlerProfiles::from_json(PROFILES).unwrap();
        let tools = FfmpegTools::default();

        assert!(profiles
            .select(&descriptor(&dir, "a.mp4", Some("video/mp4")), &tools)
            .is_none());
        assert!(profiles
            .select(&descriptor(&dir, "a.bin", None), &tools)
            .is_none());
        assert!(profiles
            .select(&descriptor(&dir, "a.pdf", Some("application/pdf")), &tools)
            .is_none());
    }

    #[test]
    fn test_disallowed_mime_fails_validation() {
        let dir = TempDir::new().unwrap();
        let profiles = HandlerProfiles::from_json(PROFILES).unwrap();
        let gif = profiles
            .select(&descriptor(&dir, "a.gif", Some("image/gif")), &FfmpegTools::default())
            .unwrap();
        assert!(!gif.validate());
    }

    #[test]
    fn test_invalid_json() {
        assert!(HandlerProfiles::from_json("{\"image\": 3}").is_err());
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");
        tokio::fs::write(&path, PROFILES).await.unwrap();
        let profiles = HandlerProfiles::from_file(&path).await.unwrap();
        assert!(profiles.image.is_some());
        assert!(profiles.video.is_none());
    }
}
