//! Source media metadata gathered before transcoding

use serde::{Deserialize, Serialize};

/// Image metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Container detected from the content, e.g. "jpg"
    pub format: String,
    pub size_bytes: u64,
}

/// Video metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration: Option<f64>,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub bitrate: Option<u64>,
    pub framerate: Option<f32>,
}

/// Audio metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub duration: Option<f64>,
    pub bitrate: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub codec: Option<String>,
}

impl VideoMetadata {
    pub fn is_h264(&self) -> bool {
        self.codec == "h264"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_metadata_serialization() {
        let metadata = VideoMetadata {
            duration: Some(120.5),
            width: 1920,
            height: 1080,
            codec: "h264".to_string(),
            bitrate: Some(5_000_000),
            framerate: Some(30.0),
        };

        let json = serde_json::to_string(&metadata).unwrap();
        let deserialized: VideoMetadata = serde_json::from_str(&json).unwrap();

        assert_eq!(metadata.duration, deserialized.duration);
        assert_eq!(metadata.width, deserialized.width);
        assert!(deserialized.is_h264());
    }
}
