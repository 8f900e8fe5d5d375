use crate::ffmpeg::FfmpegTools;
use crate::handler::{begin_handle, file_size, target_formats, with_original};
use crate::metadata::AudioMetadata;
use crate::mime::is_mime_allowed;
use anyhow::Result;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use mediaflow_core::{HandleError, HandleResult, MediaKind, ObjectDescriptor, VariantResult};
use serde::{Deserialize, Serialize};

const DEFAULT_FORMAT: &str = "mp3";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioHandlerConfig {
    #[serde(default)]
    pub allow_mime_types: Vec<String>,
    #[serde(default, alias = "format")]
    pub formats: Option<Vec<String>>,
    #[serde(default)]
    pub keep_original_format: bool,
    #[serde(default)]
    pub keep_original_file: bool,
}

/// Transcodes one audio source into every configured format.
///
/// A target format equal to the source extension is passed through untouched.
pub struct AudioHandler {
    descriptor: ObjectDescriptor,
    config: AudioHandlerConfig,
    tools: FfmpegTools,
    handled: bool,
    results: Vec<VariantResult>,
    original: Option<VariantResult>,
    metadata: Option<AudioMetadata>,
}

impl AudioHandler {
    pub fn new(descriptor: ObjectDescriptor, config: AudioHandlerConfig, tools: FfmpegTools) -> Self {
        Self {
            descriptor,
            config,
            tools,
            handled: false,
            results: Vec::new(),
            original: None,
            metadata: None,
        }
    }

    pub fn descriptor(&self) -> &ObjectDescriptor {
        &self.descriptor
    }

    pub fn metadata(&self) -> Option<&AudioMetadata> {
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
        begin_handle(&mut self.handled, MediaKind::Audio)?;
        let start = std::time::Instant::now();

        let (results, original, metadata) = self.transcode().await.map_err(HandleError::encode)?;

        tracing::info!(
            variants = results.len(),
            audio_duration = ?metadata.duration,
            codec = ?metadata.codec,
            sample_rate = ?metadata.sample_rate,
            channels = ?metadata.channels,
            bitrate = ?metadata.bitrate,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Audio variants generated"
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

    async fn transcode(&self) -> Result<(Vec<VariantResult>, VariantResult, AudioMetadata)> {
        let source_path = self.descriptor.local_path();
        let metadata = self.tools.probe_audio(&source_path).await?;
        let source_size = file_size(&source_path).await?;

        let original = VariantResult::audio(
            self.descriptor.local_file_name(),
            self.descriptor.root_extension.clone(),
            source_size,
            metadata.duration,
        )
        .into_original();

        let mut tasks: Vec<BoxFuture<'_, Result<VariantResult>>> = Vec::new();
        for format in self.target_formats() {
            if self.descriptor.is_root_format(&format) {
                let original = original.clone();
                tasks.push(async move { Ok::<_, anyhow::Error>(original) }.boxed());
                continue;
            }

            let name = format!("{}.{}", self.descriptor.local_key, format);
            let output_path = self.descriptor.path_in_tmp(&name);
            let input_path = source_path.clone();
            let duration = metadata.duration;
            let tools = &self.tools;

            tasks.push(
                async move {
                    tools.transcode_audio(&input_path, &output_path).await?;
                    let size = file_size(&output_path).await?;
                    Ok::<_, anyhow::Error>(VariantResult::audio(name, format, size, duration))
                }
                .boxed(),
            );
        }

        let results = try_join_all(tasks).await?;
        Ok((results, original, metadata))
    }
}
