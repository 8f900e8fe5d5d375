//! Image processing module
//!
//! - Resizing and re-encoding into every configured dimension and format (handler)
//! - Overlaying a watermark on images and preparing overlays for video (watermark)

pub mod handler;
pub mod watermark;

pub use handler::{ImageHandler, ImageHandlerConfig};
pub use watermark::{
    PreparedOverlay, WatermarkCompositor, WatermarkOptions, WatermarkPosition, WatermarkSize,
};
