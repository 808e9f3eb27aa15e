//! Object storage boundary
//!
//! The materializer uploads through [`ObjectStore`]; the orphan sweep
//! deletes through it. Every pending image gets its own key, so deleting
//! an object one episode dropped never touches another episode's image,
//! even when both hold the same bytes.

use crate::error::StorageError;
use crate::registry::PendingImage;
use crate::validation::ImageMediaType;
use async_trait::async_trait;
use memoir_document::{ContentHash, DurableUrl};
use std::sync::Arc;

mod filesystem;

pub use filesystem::FilesystemObjectStore;

/// One object to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadObject {
    /// Storage key, e.g. `episodes/<ulid>-<blake3-prefix>.jpg`
    pub key: String,
    /// MIME type stored with the object
    pub content_type: &'static str,
    /// Original file name, for logs and error messages
    pub file_name: String,
    /// Payload
    pub data: Arc<[u8]>,
}

impl UploadObject {
    /// Build the upload for a pending image under `prefix`
    ///
    /// The key is stable for the entry, so retrying a failed commit writes
    /// the same object again.
    #[must_use]
    pub fn for_pending(prefix: &str, image: &PendingImage) -> Self {
        Self {
            key: object_key(prefix, &image.id.to_string(), image.file.data(), image.media_type),
            content_type: image.media_type.mime(),
            file_name: image.file.name().to_string(),
            data: image.file.shared_data(),
        }
    }
}

/// Object key: `{prefix}/{id}-{blake3-prefix}.{ext}`
#[must_use]
pub fn object_key(prefix: &str, id: &str, data: &[u8], media_type: ImageMediaType) -> String {
    let hash = ContentHash::compute(data).short();
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{id}-{hash}.{}", media_type.extension())
    } else {
        format!("{prefix}/{id}-{hash}.{}", media_type.extension())
    }
}

/// Durable object storage
///
/// Implement this trait to back the pipeline with S3, GCS, or a CDN
/// origin. Implementations must be safe to call concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object and return its durable URL
    async fn upload(&self, object: UploadObject) -> Result<DurableUrl, StorageError>;

    /// Delete the object behind `url`; deleting a missing object succeeds
    async fn delete(&self, url: &DurableUrl) -> Result<(), StorageError>;

    /// Whether `url` points into this store
    fn owns(&self, url: &str) -> bool;
}
