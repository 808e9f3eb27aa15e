//! Commit-time materialization against an in-memory object store.

use memoir_document::{is_temporary, DocumentFormat};
use memoir_media::{MaterializeError, Materializer, MediaConfig, PendingImageRegistry};
use memoir_test_utils::{body_with_images, body_with_references, jpeg_image, png_image, MemoryObjectStore};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn setup(config: MediaConfig) -> (Arc<MemoryObjectStore>, Materializer<MemoryObjectStore>) {
    let store = Arc::new(MemoryObjectStore::new());
    let materializer = Materializer::new(Arc::clone(&store), config);
    (store, materializer)
}

#[tokio::test]
async fn duplicated_image_is_uploaded_once_and_replaced_everywhere() {
    for format in [DocumentFormat::Json, DocumentFormat::Html, DocumentFormat::Markdown] {
        let (store, materializer) = setup(MediaConfig::default());
        let mut registry = PendingImageRegistry::default();
        let reference = registry.add_pending_image(jpeg_image("dog.jpg", 1)).unwrap();
        let body = body_with_references(format, &[&reference, &reference, &reference]);

        let durable = materializer.materialize(&mut registry, &body).await.unwrap();

        let srcs = durable.image_sources().unwrap();
        assert_eq!(srcs.len(), 3, "{format}");
        assert!(srcs.iter().all(|src| src == &srcs[0]), "{format}");
        assert!(srcs[0].starts_with("https://cdn.test/memoir/episodes/"), "{format}");
        assert_eq!(store.upload_calls(), 1, "{format}");
    }
}

#[tokio::test]
async fn second_materialize_is_a_no_op() {
    let (store, materializer) = setup(MediaConfig::default());
    let mut registry = PendingImageRegistry::default();
    let a = registry.add_pending_image(jpeg_image("a.jpg", 1)).unwrap();
    let body = body_with_references(DocumentFormat::Html, &[&a]);

    let first = materializer.materialize(&mut registry, &body).await.unwrap();
    let second = materializer.materialize(&mut registry, &first).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.upload_calls(), 1);
}

#[tokio::test]
async fn materialized_body_has_no_temporary_images() {
    let (_, materializer) = setup(MediaConfig::default());
    let mut registry = PendingImageRegistry::default();
    let a = registry.add_pending_image(jpeg_image("a.jpg", 1)).unwrap();
    let b = registry.add_pending_image(png_image("b.png", 2)).unwrap();
    let body = body_with_images(
        DocumentFormat::Markdown,
        &[a.as_str(), "https://flickr.test/kept.jpg", b.as_str()],
    );

    let durable = materializer.materialize(&mut registry, &body).await.unwrap();

    assert!(!durable.source().contains("blob:"));
    let srcs = durable.image_sources().unwrap();
    assert!(srcs.iter().all(|src| !is_temporary(src)));
    assert_eq!(srcs[1], "https://flickr.test/kept.jpg");
}

#[tokio::test]
async fn partial_failure_returns_no_body_and_retry_skips_finished_uploads() {
    let (store, materializer) = setup(MediaConfig::default());
    let mut registry = PendingImageRegistry::default();
    let first = registry.add_pending_image(jpeg_image("first.jpg", 1)).unwrap();
    let second = registry.add_pending_image(jpeg_image("second.jpg", 2)).unwrap();
    let body = body_with_references(DocumentFormat::Json, &[&first, &second]);
    let original = body.clone();

    store.fail_uploads_of("second.jpg");
    let err = materializer.materialize(&mut registry, &body).await.unwrap_err();

    assert!(matches!(&err, MaterializeError::UploadFailed { reference, .. } if *reference == second));
    assert_eq!(err.failed_file(), Some("second.jpg"));
    assert_eq!(body, original);
    assert_eq!(registry.len(), 2);
    assert!(registry.get(first.as_str()).unwrap().uploaded.is_some());

    store.heal();
    let durable = materializer.materialize(&mut registry, &body).await.unwrap();

    assert!(durable.temporary_references().unwrap().is_empty());
    assert_eq!(store.uploaded_files(), vec!["first.jpg", "second.jpg"]);
    assert_eq!(store.upload_calls(), 3);
    assert!(registry.is_empty());
    assert!(registry.take_abandoned_uploads().is_empty());
}

#[tokio::test]
async fn images_deleted_before_save_are_never_uploaded() {
    let (store, materializer) = setup(MediaConfig::default());
    let mut registry = PendingImageRegistry::default();
    let kept = registry.add_pending_image(jpeg_image("kept.jpg", 1)).unwrap();
    registry.add_pending_image(jpeg_image("removed.jpg", 2)).unwrap();
    let body = body_with_references(DocumentFormat::Html, &[&kept]);

    materializer.materialize(&mut registry, &body).await.unwrap();

    assert_eq!(store.uploaded_files(), vec!["kept.jpg"]);
}

#[tokio::test]
async fn concurrent_uploads_keep_every_mapping() {
    let config = MediaConfig::default().with_upload_concurrency(4);
    let (store, materializer) = setup(config);
    let mut registry = PendingImageRegistry::default();
    let refs: Vec<_> = (0..10)
        .map(|i| {
            registry
                .add_pending_image(jpeg_image(&format!("{i}.jpg"), i))
                .unwrap()
        })
        .collect();
    let ref_list: Vec<_> = refs.iter().collect();
    let body = body_with_references(DocumentFormat::Html, &ref_list);

    let durable = materializer.materialize(&mut registry, &body).await.unwrap();

    assert_eq!(store.upload_calls(), 10);
    let srcs = durable.image_sources().unwrap();
    let distinct: std::collections::BTreeSet<_> = srcs.iter().collect();
    assert_eq!(distinct.len(), 10);
}

#[tokio::test]
async fn identical_bytes_get_separate_objects() {
    let (store, materializer) = setup(MediaConfig::default());
    let mut registry = PendingImageRegistry::default();
    let a = registry.add_pending_image(jpeg_image("a.jpg", 9)).unwrap();
    let b = registry.add_pending_image(jpeg_image("copy-of-a.jpg", 9)).unwrap();
    let body = body_with_references(DocumentFormat::Html, &[&a, &b]);

    let durable = materializer.materialize(&mut registry, &body).await.unwrap();

    let srcs = durable.image_sources().unwrap();
    assert_ne!(srcs[0], srcs[1]);
    assert_eq!(store.object_count(), 2);
}

#[tokio::test]
async fn html_attribute_holding_gt_is_rewritten() {
    let (store, materializer) = setup(MediaConfig::default());
    let mut registry = PendingImageRegistry::default();
    let a = registry.add_pending_image(jpeg_image("chart.jpg", 3)).unwrap();
    let body = memoir_document::DocumentBody::html(format!(
        "<p>Odds</p><img alt=\"1 > 0\" title='src=\"x\"' src=\"{a}\">"
    ));

    let durable = materializer.materialize(&mut registry, &body).await.unwrap();

    assert!(!durable.source().contains("blob:"));
    assert!(durable.source().contains("alt=\"1 > 0\""));
    assert_eq!(store.object_count(), 1);
    let srcs = durable.image_sources().unwrap();
    assert_eq!(srcs.len(), 1);
    assert!(srcs[0].starts_with("https://cdn.test/memoir/episodes/"));
}
