use crate::ffmpeg::{FfmpegTools, OverlayInput, VideoEncode};
use crate::handler::{begin_handle, file_size, sized_variant_name, target_formats, with_original};
use crate::image::watermark::{WatermarkCompositor, WatermarkOptions};
use crate::metadata::VideoMetadata;
use crate::mime::is_mime_allowed;
use crate::video::timemark::Timemark;
use anyhow::{Context, Result};
use futures::future::{join, join_all, BoxFuture, FutureExt};
use mediaflow_core::dimension::{resolve, resolve_all};
use mediaflow_core::{Dimension, HandleError, HandleResult, MediaKind, ObjectDescriptor, VariantResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_FORMAT: &str = "mp4";
const DEFAULT_THUMBNAIL_FORMAT: &str = "jpg";
const DEFAULT_VIDEO_CODEC: &str = "libx264";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoHandlerConfig {
    #[serde(default)]
    pub allow_mime_types: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default, alias = "format")]
    pub formats: Option<Vec<String>>,
    #[serde(default)]
    pub keep_original_format: bool,
    #[serde(default)]
    pub keep_original_file: bool,
    #[serde(default)]
    pub watermark: Option<WatermarkOptions>,
    pub thumbnail_dimension: Dimension,
    #[serde(default)]
    pub thumbnail_timemark: Option<Timemark>,
    #[serde(default)]
    pub thumbnail_format: Option<String>,
    /// Used only when the (normalized) source is not already H.264
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
}

/// What to do for one (dimension, format) combination
#[derive(Debug, Clone, PartialEq)]
enum VariantPlan {
    Passthrough,
    Encode {
        name: String,
        dimension: Dimension,
        format: String,
    },
}

pub struct VideoHandler {
    descriptor: ObjectDescriptor,
    config: VideoHandlerConfig,
    tools: FfmpegTools,
    handled: bool,
    videos: Vec<VariantResult>,
    original: Option<VariantResult>,
    thumbnail: Option<VariantResult>,
    metadata: Option<VideoMetadata>,
}

impl VideoHandler {
    pub fn new(descriptor: ObjectDescriptor, config: VideoHandlerConfig, tools: FfmpegTools) -> Self {
        Self {
            descriptor,
            config,
            tools,
            handled: false,
            videos: Vec::new(),
            original: None,
            thumbnail: None,
            metadata: None,
        }
    }

    pub fn descriptor(&self) -> &ObjectDescriptor {
        &self.descriptor
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    pub fn validate(&self) -> bool {
        is_mime_allowed(&self.config.allow_mime_types, self.descriptor.mime_type())
    }

    pub fn target_formats(&self) -> Vec<String> {
        target_formats(
            self.config.keep_original_format,
            self.config.formats.as_deref(),
            &self.descriptor.root_extension,
            DEFAULT_FORMAT,
        )
    }

    pub fn thumbnail_name(&self) -> String {
        format!(
            "{}-thumbnail.{}",
            self.descriptor.local_key,
            self.thumbnail_format()
        )
    }

    fn thumbnail_format(&self) -> &str {
        self.config
            .thumbnail_format
            .as_deref()
            .unwrap_or(DEFAULT_THUMBNAIL_FORMAT)
    }

    fn normalized_path(&self) -> PathBuf {
        self.descriptor
            .path_in_tmp(format!("{}-normalized.mp4", self.descriptor.local_key))
    }

    fn plan(&self, source: Dimension) -> Vec<VariantPlan> {
        let watermarked = self.config.watermark.is_some();
        let formats = self.target_formats();
        let mut plan = Vec::new();

        for dimension in resolve_all(source, &self.config.dimensions) {
            for format in &formats {
                if !watermarked
                    && dimension.same_size(&source)
                    && self.descriptor.is_root_format(format)
                {
                    plan.push(VariantPlan::Passthrough);
                } else {
                    plan.push(VariantPlan::Encode {
                        name: sized_variant_name(&self.descriptor.local_key, dimension, format),
                        dimension,
                        format: format.clone(),
                    });
                }
            }
        }
        plan
    }

    #[tracing::instrument(skip(self), fields(local_key = %self.descriptor.local_key))]
    pub async fn handle(&mut self) -> HandleResult<()> {
        begin_handle(&mut self.handled, MediaKind::Video)?;
        let start = std::time::Instant::now();

        let output = self.transcode().await.map_err(HandleError::encode)?;

        tracing::info!(
            variants = output.videos.len(),
            width = output.metadata.width,
            height = output.metadata.height,
            codec = %output.metadata.codec,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Video variants generated"
        );

        self.videos = output.videos;
        self.original = Some(output.original);
        self.thumbnail = Some(output.thumbnail);
        self.metadata = Some(output.metadata);
        Ok(())
    }

    /// Video variants, the original when requested, then the thumbnail last.
    pub fn result(&self) -> Vec<VariantResult> {
        let mut results = with_original(
            &self.videos,
            self.config.keep_original_file,
            self.original.as_ref(),
        );
        if let Some(thumbnail) = &self.thumbnail {
            results.push(thumbnail.clone());
        }
        results
    }

    async fn transcode(&self) -> Result<TranscodeOutput> {
        let source_path = self.descriptor.local_path();
        let metadata = self.tools.probe_video(&source_path).await?;
        let source_size = file_size(&source_path).await?;
        let source = Dimension::new(metadata.width, metadata.height);

        let watermark = match self.config.watermark.clone() {
            Some(options) => Some(
                tokio::task::spawn_blocking(move || WatermarkCompositor::load(options))
                    .await
                    .context("Watermark load task panicked")??,
            ),
            None => None,
        };

        // A watermarked run re-encodes every variant from one normalized H.264 source.
        let (input, input_is_h264) = if watermark.is_some() {
            let normalized = self.normalized_path();
            self.tools
                .normalize_video(&source_path, &normalized)
                .await
                .context("Failed to normalize source video")?;
            (normalized, true)
        } else {
            (source_path.clone(), metadata.is_h264())
        };

        let vcodec = if input_is_h264 {
            None
        } else {
            Some(
                self.config
                    .vcodec
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VIDEO_CODEC.to_string()),
            )
        };

        let original = VariantResult::video(
            self.descriptor.local_file_name(),
            self.descriptor.root_extension.clone(),
            source_size,
            source,
            metadata.duration,
        )
        .into_original();

        let mut tasks: Vec<BoxFuture<'_, Result<VariantResult>>> = Vec::new();
        for step in self.plan(source) {
            match step {
                VariantPlan::Passthrough => {
                    let original = original.clone();
                    tasks.push(async move { Ok::<_, anyhow::Error>(original) }.boxed());
                }
                VariantPlan::Encode {
                    name,
                    dimension,
                    format,
                } => {
                    let output_path = self.descriptor.path_in_tmp(&name);
                    let input = input.as_path();
                    let watermark = watermark.as_ref();
                    let vcodec = vcodec.clone();
                    let duration = metadata.duration;

                    tasks.push(
                        async move {
                            let overlay = match watermark {
                                Some(watermark) => {
                                    let prepared = watermark
                                        .prepare_for_video(dimension, &self.descriptor.local_tmp_dir)
                                        .await?;
                                    Some(OverlayInput {
                                        path: prepared.path,
                                        x: prepared.x,
                                        y: prepared.y,
                                    })
                                }
                                None => None,
                            };
                            let encode = VideoEncode {
                                size: dimension,
                                acodec: self.config.acodec.clone(),
                                vcodec,
                                overlay,
                            };
                            self.tools
                                .transcode_video(input, &output_path, &encode)
                                .await?;
                            let size = file_size(&output_path).await?;
                            Ok::<_, anyhow::Error>(VariantResult::video(
                                name, format, size, dimension, duration,
                            ))
                        }
                        .boxed(),
                    );
                }
            }
        }

        // Overlay preparation runs on blocking threads; let every task settle before failing.
        let (videos, thumbnail) =
            join(join_all(tasks), self.thumbnail(&input, source, metadata.duration)).await;
        let videos = videos.into_iter().collect::<Result<Vec<_>>>()?;
        let thumbnail = thumbnail?;

        Ok(TranscodeOutput {
            videos,
            original,
            thumbnail,
            metadata,
        })
    }

    async fn thumbnail(
        &self,
        input: &Path,
        source: Dimension,
        duration: Option<f64>,
    ) -> Result<VariantResult> {
        let dimension = resolve(source, self.config.thumbnail_dimension);
        let name = self.thumbnail_name();
        let output_path = self.descriptor.path_in_tmp(&name);
        let at = self
            .config
            .thumbnail_timemark
            .unwrap_or_default()
            .at(duration);

        self.tools
            .extract_frame(input, &output_path, at, dimension)
            .await
            .context("Failed to extract thumbnail")?;
        let size = file_size(&output_path).await?;

        Ok(VariantResult::image(
            name,
            self.thumbnail_format().to_string(),
            size,
            dimension,
        ))
    }
}

struct TranscodeOutput {
    videos: Vec<VariantResult>,
    original: VariantResult,
    thumbnail: VariantResult,
    metadata: VideoMetadata,
}
