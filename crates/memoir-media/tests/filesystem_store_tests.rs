//! Filesystem object store behaviour on a real directory.

use memoir_document::DurableUrl;
use memoir_media::{
    object_key, FilesystemObjectStore, ImageFile, ImageMediaType, ObjectStore, StorageError,
    UploadObject,
};
use std::sync::Arc;
use tempfile::TempDir;

const BASE: &str = "https://cdn.test/objects";

fn store() -> (TempDir, FilesystemObjectStore) {
    let dir = TempDir::new().unwrap();
    let store = FilesystemObjectStore::new(dir.path(), BASE);
    (dir, store)
}

/// Upload named after `name`, keyed as if `name` were the pending image id
fn object(name: &str, bytes: &[u8]) -> UploadObject {
    UploadObject {
        key: object_key("episodes", name, bytes, ImageMediaType::Png),
        content_type: ImageMediaType::Png.mime(),
        file_name: name.to_string(),
        data: Arc::from(bytes),
    }
}

async fn stored_files(dir: &TempDir) -> Vec<String> {
    let mut entries = tokio::fs::read_dir(dir.path().join("episodes")).await.unwrap();
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
}

#[tokio::test]
async fn upload_writes_file_and_returns_public_url() {
    let (dir, store) = store();
    let object = object("a.png", b"png-bytes");
    let key = object.key.clone();

    let url = store.upload(object).await.unwrap();

    assert_eq!(url.as_str(), format!("{BASE}/{key}"));
    let written = tokio::fs::read(dir.path().join(&key)).await.unwrap();
    assert_eq!(written, b"png-bytes");
    assert!(store.owns(url.as_str()));
}

#[tokio::test]
async fn retried_upload_is_idempotent() {
    let (dir, store) = store();

    let first = store.upload(object("a.png", b"same")).await.unwrap();
    let second = store.upload(object("a.png", b"same")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(stored_files(&dir).await.len(), 1);
}

#[tokio::test]
async fn same_bytes_from_two_images_are_stored_twice() {
    let (dir, store) = store();

    let first = store.upload(object("a.png", b"same")).await.unwrap();
    let second = store.upload(object("b.png", b"same")).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(stored_files(&dir).await.len(), 2);
}

#[tokio::test]
async fn concurrent_uploads_of_one_key_leave_one_file() {
    let (dir, store) = store();

    let (first, second) = tokio::join!(
        store.upload(object("a.png", b"racing")),
        store.upload(object("a.png", b"racing")),
    );

    assert_eq!(first.unwrap(), second.unwrap());
    let files = stored_files(&dir).await;
    assert_eq!(files.len(), 1);
    assert!(files.iter().all(|name| !name.ends_with(".tmp")));
}

#[tokio::test]
async fn delete_removes_and_tolerates_missing() {
    let (dir, store) = store();
    let object = object("a.png", b"bye");
    let key = object.key.clone();
    let url = store.upload(object).await.unwrap();

    store.delete(&url).await.unwrap();
    assert!(!dir.path().join(&key).exists());
    store.delete(&url).await.unwrap();
}

#[tokio::test]
async fn foreign_urls_are_refused() {
    let (_dir, store) = store();
    let err = store
        .delete(&DurableUrl::new("https://elsewhere.test/a.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ForeignUrl(_)));

    let err = store
        .delete(&DurableUrl::new(format!("{BASE}/../secrets.txt")))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));
}

#[tokio::test]
async fn image_file_from_path_detects_type() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Beach.JPG");
    tokio::fs::write(&path, [0xFF, 0xD8, 0xFF]).await.unwrap();

    let file = ImageFile::from_path(&path).await.unwrap();
    assert_eq!(file.name(), "Beach.JPG");
    assert_eq!(file.content_type(), "image/jpeg");
    assert_eq!(file.len(), 3);
}
