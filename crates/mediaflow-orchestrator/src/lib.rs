//! Mediaflow Orchestrator
//!
//! Drives one storage-change event through staging, type detection, handler
//! selection, transcoding, upload and notification, then removes the run's
//! temp directory whatever the outcome.

pub mod config;
pub mod event;
pub mod notification;
pub mod orchestrator;

// Re-export commonly used types
pub use config::RunConfig;
pub use event::{parse_event, StorageEvent};
pub use orchestrator::{Orchestrator, RunOutcome, RunStage};
