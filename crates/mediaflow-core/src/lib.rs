//! Mediaflow Core Library
//!
//! This crate provides the domain model, dimension math, error taxonomy and
//! configuration shared by every mediaflow component.

pub mod config;
pub mod dimension;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use dimension::{Dimension, ScalePercent};
pub use error::{HandleError, HandleResult};
pub use models::{MediaKind, ObjectDescriptor, VariantResult};
pub use storage_types::StorageBackend;
