mod helpers;

use helpers::{event, event_with_records, png_bytes, s3_record, MockStorage};
use mediaflow_core::{Dimension, HandleError, MediaKind, ObjectDescriptor, VariantResult};
use mediaflow_orchestrator::{Orchestrator, RunConfig, RunStage};
use mediaflow_processing::{FfmpegTools, HandlerProfiles, ImageHandlerConfig};
use mediaflow_storage::ObjectMetadata;
use serde_json::{json, Map};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn image_profiles(allow: &[&str]) -> HandlerProfiles {
    HandlerProfiles {
        image: Some(ImageHandlerConfig {
            allow_mime_types: allow.iter().map(|s| s.to_string()).collect(),
            dimensions: vec![
                Dimension::keeping_aspect_ratio(200, 200),
                Dimension::keeping_aspect_ratio(100, 100),
            ],
            formats: Some(vec!["jpg".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn processed_path(_: &ObjectDescriptor, variant: &VariantResult) -> String {
    format!("processed/{}", variant.name)
}

fn run_config(profiles: HandlerProfiles, tmp_root: &Path) -> RunConfig {
    RunConfig::from_profiles(profiles, FfmpegTools::default(), processed_path)
        .with_tmp_dir_root(tmp_root)
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[tokio::test]
async fn test_image_run_uploads_every_variant() {
    let tmp = TempDir::new().unwrap();
    let storage = Arc::new(MockStorage::new());
    storage.insert(
        "uploads",
        "photos/cat.png",
        png_bytes(400, 200),
        ObjectMetadata::from([("owner".to_string(), "u1".to_string())]),
    );

    let config = run_config(image_profiles(&["image/*"]), tmp.path())
        .with_acl("public-read")
        .with_metadata_factory(|d, _| d.remote_metadata.clone());
    let orchestrator = Orchestrator::new(storage.clone(), config);

    let outcome = orchestrator.run(&event("uploads", "photos/cat.png", 1)).await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert!(outcome.cleaned_up);
    assert_eq!(outcome.failed_at, None);
    assert!(is_empty_dir(tmp.path()));

    let uploads = storage.uploads();
    assert_eq!(uploads.len(), 2);
    for upload in &uploads {
        assert_eq!(upload.bucket, "uploads");
        assert!(upload.key.starts_with("processed/"));
        assert!(upload.key.ends_with(".jpg"));
        assert_eq!(upload.acl, "public-read");
        assert_eq!(upload.metadata.get("owner"), Some(&"u1".to_string()));
        assert!(!upload.bytes.is_empty());
    }

    let n = &outcome.notification;
    assert_eq!(n["statusCode"], 200);
    assert_eq!(n["type"], "MEDIA_HANDLE");
    let data = n["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    for entry in data {
        assert_eq!(entry["type"], "image");
        assert!(entry["path"].as_str().unwrap().starts_with("processed/"));
    }

    let mut dims: Vec<_> = outcome
        .results
        .iter()
        .map(|r| r.dimension.unwrap())
        .map(|d| (d.width, d.height))
        .collect();
    dims.sort();
    assert_eq!(dims, vec![(100, 50), (200, 100)]);
    assert!(outcome.results.iter().all(|r| r.kind == MediaKind::Image));
}

#[tokio::test]
async fn test_zero_or_two_records_fail_at_event_parsed() {
    let tmp = TempDir::new().unwrap();
    let storage = Arc::new(MockStorage::new());
    let orchestrator = Orchestrator::new(
        storage.clone(),
        run_config(image_profiles(&["image/*"]), tmp.path()),
    );

    for records in [
        vec![],
        vec![
            s3_record("uploads", "a.png", 1),
            s3_record("uploads", "b.png", 1),
        ],
    ] {
        let outcome = orchestrator.run(&event_with_records(records)).await;

        assert!(matches!(outcome.error, Some(HandleError::EventShape(_))));
        assert_eq!(outcome.failed_at, Some(RunStage::EventParsed));
        assert!(outcome.cleaned_up);
        assert_eq!(outcome.notification["statusCode"], 500);
        assert!(outcome.notification["data"].is_string());
    }
    assert!(storage.uploads().is_empty());
}

#[tokio::test]
async fn test_missing_extension_fails_at_event_parsed() {
    let tmp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(MockStorage::new()),
        run_config(image_profiles(&["image/*"]), tmp.path()),
    );

    let outcome = orchestrator.run(&event("uploads", "photos/cat", 1)).await;
    assert!(matches!(outcome.error, Some(HandleError::MissingExtension(_))));
    assert_eq!(outcome.failed_at, Some(RunStage::EventParsed));
}

#[tokio::test]
async fn test_missing_object_fails_at_staging() {
    let tmp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(MockStorage::new()),
        run_config(image_profiles(&["image/*"]), tmp.path()),
    );

    let outcome = orchestrator.run(&event("uploads", "gone.png", 1)).await;
    assert!(matches!(outcome.error, Some(HandleError::Staging(_))));
    assert_eq!(outcome.failed_at, Some(RunStage::LocalStaged));
    assert!(outcome.cleaned_up);
    assert!(is_empty_dir(tmp.path()));
}

#[tokio::test]
async fn test_unrecognized_content_is_unsupported() {
    let tmp = TempDir::new().unwrap();
    let storage = Arc::new(MockStorage::new());
    // The name says png, the bytes do not.
    storage.insert(
        "uploads",
        "notes.png",
        b"just some plain text".to_vec(),
        ObjectMetadata::new(),
    );
    let orchestrator = Orchestrator::new(
        storage,
        run_config(image_profiles(&["image/*"]), tmp.path()),
    );

    let outcome = orchestrator.run(&event("uploads", "notes.png", 20)).await;
    assert!(matches!(outcome.error, Some(HandleError::UnsupportedMedia(_))));
    assert_eq!(outcome.failed_at, Some(RunStage::TypeDetected));
    assert_eq!(outcome.notification["statusCode"], 500);
}

#[tokio::test]
async fn test_no_handler_and_not_allowed_are_distinct() {
    let tmp = TempDir::new().unwrap();
    let storage = Arc::new(MockStorage::new());
    storage.insert("uploads", "a.png", png_bytes(20, 20), ObjectMetadata::new());

    let no_handler = Orchestrator::new(
        storage.clone(),
        run_config(HandlerProfiles::default(), tmp.path()),
    )
    .run(&event("uploads", "a.png", 1))
    .await;
    assert_eq!(no_handler.failed_at, Some(RunStage::HandlerSelected));
    let message = no_handler.error.unwrap().to_string();
    assert!(message.contains("no handler"), "{}", message);

    let not_allowed = Orchestrator::new(
        storage.clone(),
        run_config(image_profiles(&["image/jpeg"]), tmp.path()),
    )
    .run(&event("uploads", "a.png", 1))
    .await;
    assert_eq!(not_allowed.failed_at, Some(RunStage::Validated));
    let message = not_allowed.error.unwrap().to_string();
    assert!(message.contains("not allowed"), "{}", message);

    assert!(storage.uploads().is_empty());
}

#[tokio::test]
async fn test_upload_failure_fails_run() {
    let tmp = TempDir::new().unwrap();
    let storage = Arc::new(MockStorage::new());
    storage.insert("uploads", "cat.png", png_bytes(400, 200), ObjectMetadata::new());
    storage.fail_uploads_containing("100_50");

    let orchestrator = Orchestrator::new(
        storage.clone(),
        run_config(image_profiles(&["image/*"]), tmp.path()),
    );
    let outcome = orchestrator.run(&event("uploads", "cat.png", 1)).await;

    assert!(matches!(outcome.error, Some(HandleError::Upload(_))));
    assert_eq!(outcome.failed_at, Some(RunStage::Uploaded));
    assert!(outcome.results.is_empty());
    assert!(outcome.cleaned_up);
    assert!(is_empty_dir(tmp.path()));
    assert_eq!(outcome.notification["statusCode"], 500);
    assert!(storage.uploads().iter().all(|u| !u.key.contains("100_50")));
}

#[tokio::test]
async fn test_notification_factory_fields_win() {
    let tmp = TempDir::new().unwrap();
    let storage = Arc::new(MockStorage::new());
    storage.insert("uploads", "cat.png", png_bytes(40, 40), ObjectMetadata::new());

    let config = run_config(image_profiles(&["image/*"]), tmp.path()).with_notification_factory(
        |descriptor, results| {
            let mut fields = Map::new();
            fields.insert("type".to_string(), json!("THUMBNAILS_READY"));
            fields.insert(
                "sourceKey".to_string(),
                json!(descriptor.map(|d| d.key.clone())),
            );
            fields.insert("count".to_string(), json!(results.map(|r| r.len())));
            fields
        },
    );
    let outcome = Orchestrator::new(storage, config)
        .run(&event("uploads", "cat.png", 1))
        .await;

    let n = &outcome.notification;
    assert_eq!(n["statusCode"], 200);
    assert_eq!(n["type"], "THUMBNAILS_READY");
    assert_eq!(n["sourceKey"], "cat.png");
    // A 40x40 source resolves both dimensions to 40x40, leaving one variant.
    assert_eq!(n["count"], 1);
}

#[tokio::test]
async fn test_keep_original_file_uploads_passthrough() {
    let tmp = TempDir::new().unwrap();
    let storage = Arc::new(MockStorage::new());
    storage.insert("uploads", "cat.png", png_bytes(400, 200), ObjectMetadata::new());

    let profiles = HandlerProfiles {
        image: Some(ImageHandlerConfig {
            allow_mime_types: vec!["image/png".to_string()],
            dimensions: vec![Dimension::keeping_aspect_ratio(100, 100)],
            keep_original_file: true,
            ..Default::default()
        }),
        ..Default::default()
    };
    let outcome = Orchestrator::new(storage.clone(), run_config(profiles, tmp.path()))
        .run(&event("uploads", "cat.png", 1))
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results.iter().filter(|r| r.is_original).count(), 1);
    assert_eq!(storage.uploads().len(), 2);
}
