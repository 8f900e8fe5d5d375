//! The run state machine
//!
//! `Init → EventParsed → LocalStaged → TypeDetected → HandlerSelected → Validated →
//! Transcoded → Uploaded → Notified → CleanedUp`, with `Failed` reachable from any
//! stage before `Notified`. A failed run still notifies and still cleans up.

use crate::config::RunConfig;
use crate::event::parse_event;
use crate::notification;
use futures::future::try_join_all;
use mediaflow_core::{HandleError, HandleResult, ObjectDescriptor, VariantResult};
use mediaflow_processing::detect_mime_type;
use mediaflow_storage::ObjectStorage;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Init,
    EventParsed,
    LocalStaged,
    TypeDetected,
    HandlerSelected,
    Validated,
    Transcoded,
    Uploaded,
    Notified,
    CleanedUp,
    Failed,
}

impl RunStage {
    /// The stage a successful step from `self` lands on
    fn next(self) -> RunStage {
        match self {
            RunStage::Init => RunStage::EventParsed,
            RunStage::EventParsed => RunStage::LocalStaged,
            RunStage::LocalStaged => RunStage::TypeDetected,
            RunStage::TypeDetected => RunStage::HandlerSelected,
            RunStage::HandlerSelected => RunStage::Validated,
            RunStage::Validated => RunStage::Transcoded,
            RunStage::Transcoded => RunStage::Uploaded,
            RunStage::Uploaded => RunStage::Notified,
            RunStage::Notified => RunStage::CleanedUp,
            RunStage::CleanedUp | RunStage::Failed => self,
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Init => "init",
            RunStage::EventParsed => "event_parsed",
            RunStage::LocalStaged => "local_staged",
            RunStage::TypeDetected => "type_detected",
            RunStage::HandlerSelected => "handler_selected",
            RunStage::Validated => "validated",
            RunStage::Transcoded => "transcoded",
            RunStage::Uploaded => "uploaded",
            RunStage::Notified => "notified",
            RunStage::CleanedUp => "cleaned_up",
            RunStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Everything a caller learns from one run
#[derive(Debug)]
pub struct RunOutcome {
    pub notification: Value,
    pub error: Option<HandleError>,
    /// The stage that was being entered when the run failed
    pub failed_at: Option<RunStage>,
    pub cleaned_up: bool,
    /// Uploaded variants, each with its `path` set
    pub results: Vec<VariantResult>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-run state, dropped at the end of `Orchestrator::run`
struct RunState {
    stage: RunStage,
    descriptor: Option<ObjectDescriptor>,
    temp_dir: Option<TempDir>,
}

impl RunState {
    fn new() -> Self {
        Self {
            stage: RunStage::Init,
            descriptor: None,
            temp_dir: None,
        }
    }

    fn attempting(&self) -> RunStage {
        self.stage.next()
    }

    fn advance(&mut self) {
        self.stage = self.stage.next();
        tracing::debug!(stage = %self.stage, "Run stage reached");
    }

    /// Remove the run directory, logging a failed removal. Dropping `RunState` early
    /// still removes it through the `TempDir` guard.
    fn cleanup(&mut self) -> bool {
        let Some(temp_dir) = self.temp_dir.take() else {
            return true;
        };
        let path = temp_dir.path().to_path_buf();
        match temp_dir.close() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Run directory removed");
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "Failed to remove run directory"
                );
                false
            }
        }
    }
}

pub struct Orchestrator {
    storage: Arc<dyn ObjectStorage>,
    config: RunConfig,
}

impl Orchestrator {
    pub fn new(storage: Arc<dyn ObjectStorage>, config: RunConfig) -> Self {
        Self { storage, config }
    }

    /// Process one inbound event end to end. Never panics on bad input; every
    /// failure is reported through the returned notification.
    #[tracing::instrument(skip(self, event), fields(run_id = %Uuid::new_v4()))]
    pub async fn run(&self, event: &str) -> RunOutcome {
        let start = Instant::now();
        let mut state = RunState::new();

        let outcome = self.process(&mut state, event).await;

        let extra = self.config.notification_factory.as_ref().map(|factory| {
            factory(
                state.descriptor.as_ref(),
                outcome.as_ref().ok().map(Vec::as_slice),
            )
        });

        let (notification, error, failed_at, results) = match outcome {
            Ok(results) => {
                let notification = notification::success(&results, extra);
                state.advance();
                (notification, None, None, results)
            }
            Err(err) => {
                let failed_at = state.attempting();
                tracing::error!(
                    error = %err,
                    code = err.code(),
                    stage = %failed_at,
                    "Run failed"
                );
                state.stage = RunStage::Failed;
                let notification = notification::failure(&err.to_string(), extra);
                (notification, Some(err), Some(failed_at), Vec::new())
            }
        };

        let cleaned_up = state.cleanup();
        if error.is_none() && cleaned_up {
            state.advance();
        }

        tracing::info!(
            success = error.is_none(),
            variants = results.len(),
            stage = %state.stage,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Run finished"
        );

        RunOutcome {
            notification,
            error,
            failed_at,
            cleaned_up,
            results,
        }
    }

    async fn process(&self, state: &mut RunState, event: &str) -> HandleResult<Vec<VariantResult>> {
        // EventParsed
        let event = parse_event(event)?;
        let run_dir_name = Uuid::new_v4().to_string();
        let descriptor = ObjectDescriptor::new(
            event.bucket,
            event.key,
            event.size,
            self.config.tmp_dir_root.join(&run_dir_name),
        )?;
        tracing::info!(
            bucket = %descriptor.bucket,
            key = %descriptor.key,
            size = ?descriptor.size,
            "Event parsed"
        );
        state.descriptor = Some(descriptor);
        state.advance();

        // LocalStaged
        state.temp_dir = Some(self.create_run_dir(&run_dir_name).await?);
        let remote_metadata = {
            let descriptor = staged(state)?;
            self.storage
                .get_object(&descriptor.bucket, &descriptor.key, &descriptor.local_path())
                .await
                .map_err(|e| HandleError::Staging(e.to_string()))?
        };
        descriptor_mut(state)?.remote_metadata = remote_metadata;
        state.advance();

        // TypeDetected
        let mime_type = detect_mime_type(&staged(state)?.local_path())
            .await
            .map_err(|e| HandleError::Staging(format!("Failed to read staged file: {}", e)))?
            .ok_or_else(|| HandleError::UnsupportedMedia("unable to detect media type".to_string()))?;
        tracing::info!(mime_type = mime_type, "Media type detected");
        descriptor_mut(state)?.detected_mime_type = Some(mime_type.to_string());
        state.advance();

        // HandlerSelected
        let mut handler = (self.config.handler_selector)(staged(state)?).ok_or_else(|| {
            HandleError::UnsupportedMedia(format!("no handler for mime type {}", mime_type))
        })?;
        tracing::info!(
            kind = %handler.kind(),
            local_key = %handler.descriptor().local_key,
            "Handler selected"
        );
        state.advance();

        // Validated
        if !handler.validate() {
            return Err(HandleError::UnsupportedMedia(format!(
                "mime type {} not allowed",
                mime_type
            )));
        }
        state.advance();

        // Transcoded
        handler.handle().await?;
        let results = handler.result();
        state.advance();

        // Uploaded
        let uploaded = self.upload_all(staged(state)?, results).await?;
        state.advance();

        Ok(uploaded)
    }

    async fn create_run_dir(&self, name: &str) -> HandleResult<TempDir> {
        let root = &self.config.tmp_dir_root;
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            HandleError::Staging(format!("Failed to create {}: {}", root.display(), e))
        })?;

        tempfile::Builder::new()
            .prefix(name)
            .rand_bytes(0)
            .tempdir_in(root)
            .map_err(|e| HandleError::Staging(format!("Failed to create run directory: {}", e)))
    }

    /// Upload every variant concurrently; the first failure fails the run.
    async fn upload_all(
        &self,
        descriptor: &ObjectDescriptor,
        results: Vec<VariantResult>,
    ) -> HandleResult<Vec<VariantResult>> {
        let total = results.len();
        let completed = AtomicUsize::new(0);
        let completed = &completed;

        let uploads = results.into_iter().map(|mut result| async move {
            let key = (self.config.path_factory)(descriptor, &result);
            let acl = (self.config.acl_factory)(descriptor, &result);
            let metadata = (self.config.metadata_factory)(descriptor, &result);
            let local_path = descriptor.path_in_tmp(&result.name);

            self.storage
                .put_object(&descriptor.bucket, &key, &local_path, &acl, &metadata)
                .await
                .map_err(|e| HandleError::Upload(format!("{}: {}", key, e)))?;

            tracing::debug!(key = %key, acl = %acl, name = %result.name, "Variant uploaded");
            completed.fetch_add(1, Ordering::SeqCst);
            result.path = Some(key);
            Ok::<_, HandleError>(result)
        });

        match try_join_all(uploads).await {
            Ok(uploaded) => {
                tracing::info!(
                    bucket = %descriptor.bucket,
                    uploaded = uploaded.len(),
                    "Variants uploaded"
                );
                Ok(uploaded)
            }
            Err(err) => {
                let done = completed.load(Ordering::SeqCst);
                if done > 0 {
                    tracing::warn!(
                        uploaded = done,
                        total = total,
                        "Upload failed; already uploaded variants are left in place"
                    );
                }
                Err(err)
            }
        }
    }
}

fn staged(state: &RunState) -> HandleResult<&ObjectDescriptor> {
    state
        .descriptor
        .as_ref()
        .ok_or_else(|| HandleError::Internal("run has no descriptor".to_string()))
}

fn descriptor_mut(state: &mut RunState) -> HandleResult<&mut ObjectDescriptor> {
    state
        .descriptor
        .as_mut()
        .ok_or_else(|| HandleError::Internal("run has no descriptor".to_string()))
}
