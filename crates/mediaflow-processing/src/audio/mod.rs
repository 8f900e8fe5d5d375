//! Audio processing module

pub mod handler;

pub use handler::{AudioHandler, AudioHandlerConfig};
