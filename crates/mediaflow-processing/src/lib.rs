//! Mediaflow Processing Library
//!
//! Media handlers turn one staged source file into its configured variants:
//! resized and re-encoded images, transcoded audio, and transcoded video with
//! a thumbnail and an optional watermark. Images are processed in-process with
//! the `image` crate; audio and video go through the ffmpeg executables.

pub mod audio;
pub mod ffmpeg;
pub mod handler;
pub mod image;
pub mod metadata;
pub mod mime;
pub mod profile;
pub mod sniff;
pub mod video;

#[cfg(all(test, unix))]
pub(crate) mod test_support;

// Re-export commonly used types
pub use audio::{AudioHandler, AudioHandlerConfig};
pub use ffmpeg::FfmpegTools;
pub use handler::MediaHandler;
pub use self::image::{
    ImageHandler, ImageHandlerConfig, WatermarkCompositor, WatermarkOptions, WatermarkPosition,
    WatermarkSize,
};
pub use metadata::{AudioMetadata, ImageMetadata, VideoMetadata};
pub use mime::is_mime_allowed;
pub use profile::HandlerProfiles;
pub use sniff::detect_mime_type;
pub use video::{Timemark, VideoHandler, VideoHandlerConfig};
