//! Video processing module
//!
//! - Probing, per-variant transcoding and the thumbnail (handler)
//! - Thumbnail position parsing (timemark)

pub mod handler;
pub mod timemark;

pub use handler::{VideoHandler, VideoHandlerConfig};
pub use timemark::Timemark;
