//! Handler dispatch and the pieces every media handler shares
//!
//! A handler is built for one staged source, validated against its allow-list,
//! driven once through `handle()`, then read through `result()`.

use crate::audio::AudioHandler;
use crate::image::ImageHandler;
use crate::video::VideoHandler;
use anyhow::Context;
use mediaflow_core::models::normalize_format;
use mediaflow_core::{Dimension, HandleError, HandleResult, MediaKind, ObjectDescriptor, VariantResult};
use std::path::Path;

/// The closed set of media handlers
pub enum MediaHandler {
    Image(ImageHandler),
    Audio(AudioHandler),
    Video(VideoHandler),
}

impl MediaHandler {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaHandler::Image(_) => MediaKind::Image,
            MediaHandler::Audio(_) => MediaKind::Audio,
            MediaHandler::Video(_) => MediaKind::Video,
        }
    }

    pub fn descriptor(&self) -> &ObjectDescriptor {
        match self {
            MediaHandler::Image(h) => h.descriptor(),
            MediaHandler::Audio(h) => h.descriptor(),
            MediaHandler::Video(h) => h.descriptor(),
        }
    }

    /// Whether the detected mime type is on the handler's allow-list
    pub fn validate(&self) -> bool {
        match self {
            MediaHandler::Image(h) => h.validate(),
            MediaHandler::Audio(h) => h.validate(),
            MediaHandler::Video(h) => h.validate(),
        }
    }

    /// Produce every variant into the run directory. Only the first call does work.
    pub async fn handle(&mut self) -> HandleResult<()> {
        match self {
            MediaHandler::Image(h) => h.handle().await,
            MediaHandler::Audio(h) => h.handle().await,
            MediaHandler::Video(h) => h.handle().await,
        }
    }

    /// Produced variants; empty before `handle()` succeeded.
    pub fn result(&self) -> Vec<VariantResult> {
        match self {
            MediaHandler::Image(h) => h.result(),
            MediaHandler::Audio(h) => h.result(),
            MediaHandler::Video(h) => h.result(),
        }
    }
}

impl From<ImageHandler> for MediaHandler {
    fn from(handler: ImageHandler) -> Self {
        MediaHandler::Image(handler)
    }
}

impl From<AudioHandler> for MediaHandler {
    fn from(handler: AudioHandler) -> Self {
        MediaHandler::Audio(handler)
    }
}

impl From<VideoHandler> for MediaHandler {
    fn from(handler: VideoHandler) -> Self {
        MediaHandler::Video(handler)
    }
}

/// Guard against a second `handle()` call.
pub(crate) fn begin_handle(handled: &mut bool, kind: MediaKind) -> HandleResult<()> {
    if *handled {
        return Err(HandleError::Internal(format!(
            "{} handler was already run",
            kind
        )));
    }
    *handled = true;
    Ok(())
}

/// Output formats: the source extension alone, the configured list, or the default.
///
/// Aliases of one format (`jpg`/`jpeg`) collapse onto their first occurrence.
pub(crate) fn target_formats(
    keep_original_format: bool,
    formats: Option<&[String]>,
    root_extension: &str,
    default_format: &str,
) -> Vec<String> {
    if keep_original_format {
        return vec![root_extension.to_string()];
    }

    match formats {
        Some(formats) => {
            let mut unique: Vec<String> = Vec::with_capacity(formats.len());
            for format in formats {
                let normalized = normalize_format(format);
                if !unique.iter().any(|u| normalize_format(u) == normalized) {
                    unique.push(format.clone());
                }
            }
            unique
        }
        None => vec![default_format.to_string()],
    }
}

/// `results`, plus `original` when requested and no produced entry already is one.
pub(crate) fn with_original(
    results: &[VariantResult],
    keep_original_file: bool,
    original: Option<&VariantResult>,
) -> Vec<VariantResult> {
    let mut all = results.to_vec();
    if keep_original_file && !results.iter().any(|r| r.is_original) {
        if let Some(original) = original {
            all.push(original.clone());
        }
    }
    all
}

/// `{local_key}-{width}_{height}.{format}`
pub(crate) fn sized_variant_name(local_key: &str, dimension: Dimension, format: &str) -> String {
    format!(
        "{}-{}_{}.{}",
        local_key, dimension.width, dimension.height, format
    )
}

pub(crate) async fn file_size(path: &Path) -> anyhow::Result<u64> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    Ok(metadata.len())
}
