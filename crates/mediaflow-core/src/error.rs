//! Error types module
//!
//! Every stage of a run is fatal on error. The variants below classify where a
//! run failed; the notification payload only carries the rendered message.

/// Result type used across the run pipeline
pub type HandleResult<T> = Result<T, HandleError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    /// Multi-record or malformed inbound envelope
    #[error("Invalid event: {0}")]
    EventShape(String),

    #[error("Cannot get extension from file: {0}")]
    MissingExtension(String),

    /// No handler for the detected type, or mime type rejected by the handler
    #[error("File not supported: {0}")]
    UnsupportedMedia(String),

    #[error("Failed to stage source object: {0}")]
    Staging(String),

    /// Any engine failure during probe, transcode, watermark or thumbnail
    #[error("Media encoding failed: {0}")]
    Encode(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandleError {
    /// Machine-readable error code (e.g., "UNSUPPORTED_MEDIA")
    pub fn code(&self) -> &'static str {
        match self {
            HandleError::EventShape(_) => "EVENT_SHAPE",
            HandleError::MissingExtension(_) => "MISSING_EXTENSION",
            HandleError::UnsupportedMedia(_) => "UNSUPPORTED_MEDIA",
            HandleError::Staging(_) => "STAGING_ERROR",
            HandleError::Encode(_) => "ENCODE_ERROR",
            HandleError::Upload(_) => "UPLOAD_ERROR",
            HandleError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Wrap an engine failure, keeping the whole context chain.
    pub fn encode(err: anyhow::Error) -> Self {
        HandleError::Encode(format!("{:#}", err))
    }
}
