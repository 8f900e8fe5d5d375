use crate::handler::{begin_handle, file_size, sized_variant_name, target_formats, with_original};
use crate::image::watermark::{WatermarkCompositor, WatermarkOptions};
use crate::metadata::ImageMetadata;
use crate::mime::is_mime_allowed;
use anyhow::{anyhow, Context, Result};
use futures::future::{join_all, BoxFuture, FutureExt};
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader};
use mediaflow_core::dimension::resolve_all;
use mediaflow_core::models::normalize_format;
use mediaflow_core::{Dimension, HandleError, HandleResult, MediaKind, ObjectDescriptor, VariantResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_FORMAT: &str = "jpg";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageHandlerConfig {
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
}

/// Decoded source shared by every variant task
struct Source {
    image: DynamicImage,
    format: Option<ImageFormat>,
}

pub struct ImageHandler {
    descriptor: ObjectDescriptor,
    config: ImageHandlerConfig,
    handled: bool,
    results: Vec<VariantResult>,
    original: Option<VariantResult>,
    metadata: Option<ImageMetadata>,
}

impl ImageHandler {
    pub fn new(descriptor: ObjectDescriptor, config: ImageHandlerConfig) -> Self {
        Self {
            descriptor,
            config,
            handled: false,
            results: Vec::new(),
            original: None,
            metadata: None,
        }
    }

    pub fn descriptor(&self) -> &ObjectDescriptor {
        &self.descriptor
    }

    /// Source metadata, once handled
    pub fn metadata(&self) -> Option<&ImageMetadata> {
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

    #[tracing::instrument(skip(self), fields(local_key = %self.descriptor.local_key))]
    pub async fn handle(&mut self) -> HandleResult<()> {
        begin_handle(&mut self.handled, MediaKind::Image)?;
        let start = std::time::Instant::now();

        let (results, original, metadata) = self.transcode().await.map_err(HandleError::encode)?;

        tracing::info!(
            variants = results.len(),
            width = metadata.width,
            height = metadata.height,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image variants generated"
        );

        self.results = results;
        self.original = Some(original);
        self.metadata = Some(metadata);
        Ok(())
    }

    pub fn result(&self) -> Vec<VariantResult> {
        with_original(
            &self.results,
            self.config.keep_original_file,
            self.original.as_ref(),
        )
    }

    async fn transcode(&self) -> Result<(Vec<VariantResult>, VariantResult, ImageMetadata)> {
        let source_path = self.descriptor.local_path();
        let source_size = file_size(&source_path).await?;

        let decode_path = source_path.clone();
        let source = tokio::task::spawn_blocking(move || decode(&decode_path))
            .await
            .context("Image decode task panicked")??;
        let source = Arc::new(source);
        let source_dimension = Dimension::new(source.image.width(), source.image.height());

        let watermark = match self.config.watermark.clone() {
            Some(options) => Some(
                tokio::task::spawn_blocking(move || WatermarkCompositor::load(options))
                    .await
                    .context("Watermark load task panicked")??,
            ),
            None => None,
        };

        let dimensions = resolve_all(source_dimension, &self.config.dimensions);
        let formats = self.target_formats();

        let original = VariantResult::image(
            self.descriptor.local_file_name(),
            self.descriptor.root_extension.clone(),
            source_size,
            source_dimension,
        )
        .into_original();

        let mut tasks: Vec<BoxFuture<'static, Result<VariantResult>>> = Vec::new();
        for dimension in &dimensions {
            for format in &formats {
                let output_format = output_format(format);

                // An extension the encoder does not know can still name the source container.
                let same_container = match output_format {
                    Some(output_format) => source.format == Some(output_format),
                    None => self.descriptor.is_root_format(format),
                };
                let is_passthrough = watermark.is_none()
                    && dimension.same_size(&source_dimension)
                    && same_container;
                if is_passthrough {
                    let original = original.clone();
                    tasks.push(async move { Ok::<_, anyhow::Error>(original) }.boxed());
                    continue;
                }

                let output_format = output_format
                    .ok_or_else(|| anyhow!("Unsupported image output format: {}", format))?;

                let name = sized_variant_name(&self.descriptor.local_key, *dimension, format);
                let job = RenderJob {
                    source: Arc::clone(&source),
                    watermark: watermark.clone(),
                    dimension: *dimension,
                    output_format,
                    output_path: self.descriptor.path_in_tmp(&name),
                };
                let format = format.clone();

                tasks.push(
                    async move {
                        let output_path = job.output_path.clone();
                        let dimension = job.dimension;
                        tokio::task::spawn_blocking(move || job.run())
                            .await
                            .context("Image resize task panicked")??;
                        let size = file_size(&output_path).await?;
                        Ok::<_, anyhow::Error>(VariantResult::image(name, format, size, dimension))
                    }
                    .boxed(),
                );
            }
        }

        // Every blocking render finishes before the first error is reported.
        let results = join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let metadata = ImageMetadata {
            width: source_dimension.width,
            height: source_dimension.height,
            format: source
                .format
                .and_then(|f| f.extensions_str().first().copied())
                .unwrap_or(self.descriptor.root_extension.as_str())
                .to_string(),
            size_bytes: source_size,
        };

        Ok((results, original, metadata))
    }
}

/// Encoder format for a format name, folding the same aliases as the source extension.
fn output_format(format: &str) -> Option<ImageFormat> {
    ImageFormat::from_extension(normalize_format(format))
}

fn decode(path: &Path) -> Result<Source> {
    let reader = ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()
        .context("Failed to detect image format")?;
    let format = reader.format();
    let image = reader.decode().context("Failed to decode image")?;
    Ok(Source { image, format })
}

/// One (dimension, format) combination, rendered on the blocking pool
struct RenderJob {
    source: Arc<Source>,
    watermark: Option<WatermarkCompositor>,
    dimension: Dimension,
    output_format: ImageFormat,
    output_path: PathBuf,
}

impl RenderJob {
    fn run(self) -> Result<()> {
        let source = &self.source.image;
        let resized = if source.width() == self.dimension.width
            && source.height() == self.dimension.height
        {
            source.clone()
        } else {
            source.resize_to_fill(
                self.dimension.width,
                self.dimension.height,
                FilterType::Lanczos3,
            )
        };

        let rendered = match &self.watermark {
            Some(watermark) => watermark.composite(&resized),
            None => resized,
        };

        encode(&rendered, &self.output_path, self.output_format)
    }
}

/// Write `image` as `format`; JPEG has no alpha channel.
fn encode(image: &DynamicImage, path: &Path, format: ImageFormat) -> Result<()> {
    let prepared = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => DynamicImage::ImageRgba8(image.to_rgba8()),
    };
    prepared
        .save_with_format(path, format)
        .with_context(|| format!("Failed to encode {}", path.display()))
}
