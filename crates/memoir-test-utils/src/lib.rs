//! Testing utilities for the memoir workspace
//!
//! Shared fakes and fixtures: an in-memory object store with failure
//! injection, an in-memory episode repository, and image payloads.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use memoir_document::{DocumentBody, DurableUrl, TemporaryReference};
use memoir_media::{
    EpisodeDraft, EpisodeId, EpisodeMetadata, EpisodeRecord, EpisodeRepository, ImageFile,
    ObjectStore, PersistenceError, StorageError, UploadObject,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TEST_BASE_URL: &str = "https://cdn.test/memoir";

/// Object store kept in memory
#[derive(Debug)]
pub struct MemoryObjectStore {
    base_url: String,
    objects: DashMap<String, Arc<[u8]>>,
    failing_files: Mutex<HashSet<String>>,
    upload_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    uploaded_files: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_base_url(TEST_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            objects: DashMap::new(),
            failing_files: Mutex::new(HashSet::new()),
            upload_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            uploaded_files: Mutex::new(Vec::new()),
        }
    }

    /// Make every upload of `file_name` fail until [`heal`](Self::heal)
    pub fn fail_uploads_of(&self, file_name: &str) {
        self.failing_files.lock().insert(file_name.to_string());
    }

    pub fn heal(&self) {
        self.failing_files.lock().clear();
    }

    /// Upload attempts, failed ones included
    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// File names of successful uploads, in completion order
    pub fn uploaded_files(&self) -> Vec<String> {
        self.uploaded_files.lock().clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn contains(&self, url: &DurableUrl) -> bool {
        self.key_for(url.as_str())
            .is_some_and(|key| self.objects.contains_key(key))
    }

    /// Store an object directly, as if uploaded by an earlier session
    pub fn seed(&self, key: &str, data: &[u8]) -> DurableUrl {
        self.objects.insert(key.to_string(), Arc::from(data));
        DurableUrl::new(format!("{}/{key}", self.base_url))
    }

    fn key_for<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.base_url)?.strip_prefix('/')
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, object: UploadObject) -> Result<DurableUrl, StorageError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_files.lock().contains(&object.file_name) {
            return Err(StorageError::Backend(format!("injected failure for {}", object.file_name)));
        }
        let url = DurableUrl::new(format!("{}/{}", self.base_url, object.key));
        self.objects.insert(object.key, object.data);
        self.uploaded_files.lock().push(object.file_name);
        Ok(url)
    }

    async fn delete(&self, url: &DurableUrl) -> Result<(), StorageError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let key = self
            .key_for(url.as_str())
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
        self.objects.remove(key);
        Ok(())
    }

    fn owns(&self, url: &str) -> bool {
        self.key_for(url).is_some_and(|key| !key.is_empty())
    }
}

/// Episode repository kept in memory
#[derive(Debug, Default)]
pub struct InMemoryEpisodeRepository {
    episodes: DashMap<EpisodeId, EpisodeRecord>,
    save_calls: AtomicUsize,
}

impl InMemoryEpisodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: EpisodeId) -> Option<EpisodeRecord> {
        self.episodes.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

#[async_trait]
impl EpisodeRepository for InMemoryEpisodeRepository {
    async fn load_episode(&self, id: EpisodeId) -> Result<Option<EpisodeRecord>, PersistenceError> {
        Ok(self.get(id))
    }

    async fn save_episode(&self, draft: EpisodeDraft) -> Result<EpisodeRecord, PersistenceError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let id = match draft.id {
            Some(id) if !self.episodes.contains_key(&id) => {
                return Err(PersistenceError::NotFound(id.to_string()));
            }
            Some(id) => id,
            None => EpisodeId::new(),
        };
        let record = EpisodeRecord {
            id,
            metadata: draft.metadata,
            body: draft.body,
            updated_at: Utc::now(),
        };
        self.episodes.insert(id, record.clone());
        Ok(record)
    }

    async fn references_image(
        &self,
        url: &DurableUrl,
        excluding: EpisodeId,
    ) -> Result<bool, PersistenceError> {
        Ok(self.episodes.iter().any(|entry| {
            *entry.key() != excluding
                && entry
                    .value()
                    .body
                    .durable_sources()
                    .map_or(true, |sources| sources.contains(url.as_str()))
        }))
    }
}

/// JPEG-looking payload; `seed` varies the bytes so object keys differ
pub fn jpeg_image(name: &str, seed: u8) -> ImageFile {
    ImageFile::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, seed, seed, 0xFF, 0xD9])
}

pub fn png_image(name: &str, seed: u8) -> ImageFile {
    ImageFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G', seed, seed])
}

/// Payload of exactly `len` bytes
pub fn sized_image(name: &str, len: usize) -> ImageFile {
    ImageFile::new(name, "image/jpeg", vec![0u8; len])
}

pub fn sample_metadata(title: &str) -> EpisodeMetadata {
    EpisodeMetadata::new(title, NaiveDate::from_ymd_opt(1979, 6, 15).unwrap_or_default())
}

/// Body with a paragraph followed by one image node per reference
pub fn body_with_images(format: memoir_document::DocumentFormat, srcs: &[&str]) -> DocumentBody {
    let mut body = match format {
        memoir_document::DocumentFormat::Json => DocumentBody::json(
            r#"{"type":"doc","content":[{"type":"paragraph","content":[{"type":"text","text":"We drove to the coast."}]}]}"#,
        ),
        memoir_document::DocumentFormat::Html => DocumentBody::html("<p>We drove to the coast.</p>"),
        memoir_document::DocumentFormat::Markdown => DocumentBody::markdown("We drove to the coast.\n"),
    };
    for src in srcs {
        body = body
            .append_image(src, "photo")
            .unwrap_or_else(|e| panic!("append_image failed: {e}"));
    }
    body
}

/// [`body_with_images`] for temporary references
pub fn body_with_references(
    format: memoir_document::DocumentFormat,
    refs: &[&TemporaryReference],
) -> DocumentBody {
    let srcs: Vec<&str> = refs.iter().map(|r| r.as_str()).collect();
    body_with_images(format, &srcs)
}
