//! Commit-time materializer
//!
//! Converts every pending image into a stored object and rewrites the
//! document body so it references durable URLs only.
//!
//! # Workflow
//! 1. Fast path: empty registry returns the body untouched, no I/O
//! 2. Prune entries the body no longer uses
//! 3. Re-validate and upload the rest in insertion order
//! 4. Rewrite image sources on a working copy once every upload succeeded
//! 5. Refuse bodies that still hold a temporary reference
//! 6. Clear the registry and hand the body back
//!
//! A failed upload aborts the commit. The caller's body is never modified,
//! and entries uploaded before the failure keep their durable URL so a
//! retry does not upload them again.

use crate::config::MediaConfig;
use crate::error::MaterializeError;
use crate::observer::reconcile;
use crate::registry::PendingImageRegistry;
use crate::storage::{ObjectStore, UploadObject};
use crate::validation::validate_image;
use futures::stream::{self, StreamExt};
use memoir_document::{DocumentBody, TemporaryReference};
use std::collections::HashMap;
use std::sync::Arc;

/// Counters for one successful commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeStats {
    /// Objects uploaded during this call
    pub uploaded: usize,
    /// Entries reused from an earlier, failed attempt
    pub reused: usize,
    /// Stale entries pruned before uploading
    pub pruned: usize,
    /// Image nodes rewritten
    pub rewritten: usize,
}

/// Uploads pending images and rewrites bodies to durable URLs
#[derive(Debug)]
pub struct Materializer<S: ObjectStore + ?Sized> {
    store: Arc<S>,
    config: MediaConfig,
}

impl<S: ObjectStore + ?Sized> Materializer<S> {
    /// Create materializer over `store`
    #[inline]
    #[must_use]
    pub fn new(store: Arc<S>, config: MediaConfig) -> Self {
        Self { store, config }
    }

    /// Backing object store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Materialize `body`, returning a body without temporary references
    ///
    /// # Errors
    /// - `MaterializeError::UploadFailed` naming the file whose upload failed
    /// - `MaterializeError::Rejected` if a pending image no longer validates
    /// - `MaterializeError::UnresolvedReference` for temporary references the registry does not hold
    /// - `MaterializeError::Document` if the body cannot be parsed
    pub async fn materialize(
        &self,
        registry: &mut PendingImageRegistry,
        body: &DocumentBody,
    ) -> Result<DocumentBody, MaterializeError> {
        self.materialize_with_stats(registry, body)
            .await
            .map(|(body, _)| body)
    }

    /// [`materialize`](Self::materialize), also returning commit counters
    ///
    /// # Errors
    /// Same as [`materialize`](Self::materialize)
    pub async fn materialize_with_stats(
        &self,
        registry: &mut PendingImageRegistry,
        body: &DocumentBody,
    ) -> Result<(DocumentBody, MaterializeStats), MaterializeError> {
        let mut stats = MaterializeStats::default();
        if registry.is_empty() {
            return Ok((body.clone(), stats));
        }

        let in_use = body.temporary_references()?;
        stats.pruned = reconcile(registry, Some(body)).pruned().len();

        let mut durable: HashMap<String, String> = HashMap::with_capacity(registry.len());
        let mut jobs: Vec<(TemporaryReference, UploadObject)> = Vec::new();
        for image in registry.iter() {
            if let Some(url) = &image.uploaded {
                durable.insert(image.reference.to_string(), url.to_string());
                stats.reused += 1;
                continue;
            }
            validate_image(&image.file, registry.limits())?;
            jobs.push((
                image.reference.clone(),
                UploadObject::for_pending(&self.config.object_key_prefix, image),
            ));
        }

        tracing::info!(
            pending = registry.len(),
            uploads = jobs.len(),
            reused = stats.reused,
            pruned = stats.pruned,
            concurrency = self.config.upload_concurrency,
            "materializing document"
        );

        // `buffered` keeps insertion order and drops in-flight uploads on abort
        let store = &self.store;
        let mut uploads = stream::iter(jobs)
            .map(|(reference, object)| async move {
                let file_name = object.file_name.clone();
                let result = store.upload(object).await;
                (reference, file_name, result)
            })
            .buffered(self.config.upload_concurrency.max(1));

        while let Some((reference, file_name, result)) = uploads.next().await {
            match result {
                Ok(url) => {
                    tracing::debug!(reference = %reference, url = %url, file = %file_name, "image uploaded");
                    durable.insert(reference.to_string(), url.to_string());
                    registry.mark_uploaded(reference.as_str(), url);
                    stats.uploaded += 1;
                }
                Err(source) => {
                    tracing::error!(
                        reference = %reference,
                        file = %file_name,
                        error = %source,
                        "upload failed, commit aborted"
                    );
                    return Err(MaterializeError::UploadFailed {
                        file_name,
                        reference,
                        source,
                    });
                }
            }
        }
        drop(uploads);

        if let Some(unknown) = in_use.iter().find(|r| !durable.contains_key(r.as_str())) {
            return Err(MaterializeError::UnresolvedReference(unknown.clone()));
        }

        let (rewritten, count) = body.rewrite_image_sources(&durable)?;
        stats.rewritten = count;

        let committed = registry.finish_commit();
        tracing::info!(
            committed,
            uploaded = stats.uploaded,
            rewritten = stats.rewritten,
            "document materialized"
        );
        Ok((rewritten, stats))
    }
}
