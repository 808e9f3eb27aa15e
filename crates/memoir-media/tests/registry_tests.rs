//! Registry, validation gate and observer consistency.

use memoir_document::{DocumentBody, DocumentFormat, TemporaryReference};
use memoir_media::{
    MutationObserver, PendingImageRegistry, UploadLimits, ValidationError, DEFAULT_MAX_IMAGE_BYTES,
};
use memoir_test_utils::{body_with_images, jpeg_image, sized_image};
use proptest::prelude::*;
use std::collections::BTreeSet;

#[test]
fn eleven_mib_is_rejected_and_never_registered() {
    let mut registry = PendingImageRegistry::default();
    let err = registry
        .add_pending_image(sized_image("huge.jpg", 11 * 1024 * 1024))
        .unwrap_err();

    assert!(matches!(
        err,
        ValidationError::PayloadTooLarge { size, max, .. }
            if size == 11 * 1024 * 1024 && max == DEFAULT_MAX_IMAGE_BYTES
    ));
    assert!(registry.is_empty());
}

#[test]
fn exactly_ten_mib_is_accepted() {
    let mut registry = PendingImageRegistry::default();
    assert!(registry
        .add_pending_image(sized_image("edge.jpg", DEFAULT_MAX_IMAGE_BYTES))
        .is_ok());
}

#[test]
fn pdf_is_rejected() {
    let mut registry = PendingImageRegistry::default();
    let pdf = memoir_media::ImageFile::new("letter.pdf", "application/pdf", vec![b'%'; 64]);

    let err = registry.add_pending_image(pdf).unwrap_err();
    assert_eq!(
        err,
        ValidationError::unsupported_media_type("letter.pdf", "application/pdf")
    );
    assert!(registry.is_empty());
}

#[test]
fn custom_limits_apply() {
    let limits = UploadLimits::default().with_max_bytes(4);
    let mut registry = PendingImageRegistry::new(limits, "tab-1");

    assert!(registry.add_pending_image(sized_image("a.jpg", 5)).is_err());
    let reference = registry.add_pending_image(sized_image("b.jpg", 4)).unwrap();
    assert!(reference.as_str().starts_with("blob:tab-1/"));
}

#[test]
fn references_are_unique() {
    let mut registry = PendingImageRegistry::default();
    let refs: BTreeSet<TemporaryReference> = (0..50)
        .map(|i| registry.add_pending_image(jpeg_image("same.jpg", i)).unwrap())
        .collect();
    assert_eq!(refs.len(), 50);
}

#[derive(Debug, Clone)]
enum EditorOp {
    Insert,
    Delete(usize),
    Duplicate(usize),
    Type,
}

fn ops() -> impl Strategy<Value = Vec<EditorOp>> {
    prop::collection::vec(
        prop_oneof![
            3 => Just(EditorOp::Insert),
            2 => any::<usize>().prop_map(EditorOp::Delete),
            1 => any::<usize>().prop_map(EditorOp::Duplicate),
            1 => Just(EditorOp::Type),
        ],
        1..30,
    )
}

fn formats() -> impl Strategy<Value = DocumentFormat> {
    prop_oneof![
        Just(DocumentFormat::Json),
        Just(DocumentFormat::Html),
        Just(DocumentFormat::Markdown),
    ]
}

proptest! {
    #[test]
    fn registry_tracks_exactly_the_images_in_the_body(format in formats(), ops in ops()) {
        let mut registry = PendingImageRegistry::default();
        let mut observer = MutationObserver::new();
        let mut srcs: Vec<String> = Vec::new();
        let mut seed = 0u8;

        for op in ops {
            match op {
                EditorOp::Insert => {
                    seed = seed.wrapping_add(1);
                    let reference = registry.add_pending_image(jpeg_image("photo.jpg", seed)).unwrap();
                    observer.invalidate();
                    srcs.push(reference.to_string());
                }
                EditorOp::Delete(i) if !srcs.is_empty() => {
                    let i = i % srcs.len();
                    srcs.remove(i);
                }
                EditorOp::Duplicate(i) if !srcs.is_empty() => {
                    let i = i % srcs.len();
                    srcs.push(srcs[i].clone());
                }
                _ => {}
            }

            let src_refs: Vec<&str> = srcs.iter().map(String::as_str).collect();
            let body: DocumentBody = body_with_images(format, &src_refs);
            observer.on_content_change(&mut registry, Some(&body));

            let tracked: BTreeSet<TemporaryReference> = registry.references().cloned().collect();
            prop_assert_eq!(tracked, body.temporary_references().unwrap());
        }
    }
}
