//! Mediaflow Storage Library
//!
//! This crate provides the object storage seam used by a run: fetching the
//! source object into the run directory and writing produced artifacts back
//! with an ACL and user metadata. It includes the `ObjectStorage` trait and
//! implementations for S3 and the local filesystem.
//!
//! # Key format
//!
//! Objects are addressed by `(bucket, key)` exactly as they appear in the
//! inbound storage event. Keys must not contain `..` or a leading `/`; the
//! checks live in the `keys` module so all backends agree.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::content_type_for;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use mediaflow_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectMetadata, ObjectStorage, StorageError, StorageResult};
