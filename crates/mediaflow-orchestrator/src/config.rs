//! Run configuration: the strategy callbacks that decide what a run does with its results.

use mediaflow_core::{ObjectDescriptor, VariantResult};
use mediaflow_processing::{FfmpegTools, HandlerProfiles, MediaHandler};
use mediaflow_storage::ObjectMetadata;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_ACL: &str = "private";

pub type HandlerSelector = Arc<dyn Fn(&ObjectDescriptor) -> Option<MediaHandler> + Send + Sync>;
/// Destination key of one variant
pub type PathFactory = Arc<dyn Fn(&ObjectDescriptor, &VariantResult) -> String + Send + Sync>;
pub type AclFactory = Arc<dyn Fn(&ObjectDescriptor, &VariantResult) -> String + Send + Sync>;
pub type MetadataFactory =
    Arc<dyn Fn(&ObjectDescriptor, &VariantResult) -> ObjectMetadata + Send + Sync>;
/// Extra notification fields; the descriptor is absent when the event never parsed
/// and the results are absent on failure.
pub type NotificationFactory = Arc<
    dyn Fn(Option<&ObjectDescriptor>, Option<&[VariantResult]>) -> Map<String, Value>
        + Send
        + Sync,
>;

#[derive(Clone)]
pub struct RunConfig {
    pub handler_selector: HandlerSelector,
    pub tmp_dir_root: PathBuf,
    pub path_factory: PathFactory,
    pub acl_factory: AclFactory,
    pub metadata_factory: MetadataFactory,
    pub notification_factory: Option<NotificationFactory>,
}

impl RunConfig {
    pub fn new<S, P>(handler_selector: S, path_factory: P) -> Self
    where
        S: Fn(&ObjectDescriptor) -> Option<MediaHandler> + Send + Sync + 'static,
        P: Fn(&ObjectDescriptor, &VariantResult) -> String + Send + Sync + 'static,
    {
        Self {
            handler_selector: Arc::new(handler_selector),
            tmp_dir_root: std::env::temp_dir().join("mediaflow"),
            path_factory: Arc::new(path_factory),
            acl_factory: Arc::new(|_, _| DEFAULT_ACL.to_string()),
            metadata_factory: Arc::new(|_, _| ObjectMetadata::new()),
            notification_factory: None,
        }
    }

    /// Select handlers from a profile document.
    pub fn from_profiles<P>(profiles: HandlerProfiles, tools: FfmpegTools, path_factory: P) -> Self
    where
        P: Fn(&ObjectDescriptor, &VariantResult) -> String + Send + Sync + 'static,
    {
        Self::new(
            move |descriptor| profiles.select(descriptor, &tools),
            path_factory,
        )
    }

    pub fn with_tmp_dir_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.tmp_dir_root = root.into();
        self
    }

    pub fn with_acl_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ObjectDescriptor, &VariantResult) -> String + Send + Sync + 'static,
    {
        self.acl_factory = Arc::new(factory);
        self
    }

    /// Same ACL for every variant.
    pub fn with_acl(self, acl: impl Into<String>) -> Self {
        let acl = acl.into();
        self.with_acl_factory(move |_, _| acl.clone())
    }

    pub fn with_metadata_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ObjectDescriptor, &VariantResult) -> ObjectMetadata + Send + Sync + 'static,
    {
        self.metadata_factory = Arc::new(factory);
        self
    }

    pub fn with_notification_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(Option<&ObjectDescriptor>, Option<&[VariantResult]>) -> Map<String, Value>
            + Send
            + Sync
            + 'static,
    {
        self.notification_factory = Some(Arc::new(factory));
        self
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("tmp_dir_root", &self.tmp_dir_root)
            .field("notification_factory", &self.notification_factory.is_some())
            .finish_non_exhaustive()
    }
}
