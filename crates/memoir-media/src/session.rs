//! Editor session
//!
//! Host surface for one editing session. Owns the pending image registry,
//! the mutation observer, and the materializer, and runs the save flow:
//!
//! 1. Validate metadata (nothing uploaded on failure)
//! 2. Materialize the body
//! 3. Refuse any body that still holds a temporary reference
//! 4. Persist the episode
//! 5. Sweep images the update dropped, plus abandoned uploads
//!
//! All operations take `&mut self`, so a session never runs two saves or a
//! save and a reconciliation at once.

use crate::config::MediaConfig;
use crate::episode::{EpisodeDraft, EpisodeId, EpisodeMetadata, EpisodeRecord, EpisodeRepository};
use crate::error::{MaterializeError, SaveError, ValidationError};
use crate::materializer::Materializer;
use crate::observer::{MutationObserver, ReconcileOutcome};
use crate::orphans::{find_orphaned_images, OrphanSweeper, SweepReport};
use crate::registry::PendingImageRegistry;
use crate::storage::ObjectStore;
use crate::validation::ImageFile;
use memoir_document::{DocumentBody, DurableUrl, TemporaryReference};
use std::sync::Arc;

/// One editing session over an episode
pub struct EditorSession<S: ObjectStore + ?Sized, R: EpisodeRepository + ?Sized> {
    registry: PendingImageRegistry,
    observer: MutationObserver,
    materializer: Materializer<S>,
    sweeper: OrphanSweeper<S>,
    repository: Arc<R>,
}

impl<S: ObjectStore + ?Sized, R: EpisodeRepository + ?Sized> EditorSession<S, R> {
    /// Create session
    #[must_use]
    pub fn new(config: MediaConfig, store: Arc<S>, repository: Arc<R>) -> Self {
        let registry = PendingImageRegistry::new(config.limits.clone(), config.temporary_origin.clone());
        Self {
            registry,
            observer: MutationObserver::new(),
            sweeper: OrphanSweeper::new(Arc::clone(&store)),
            materializer: Materializer::new(store, config),
            repository,
        }
    }

    /// Pending image registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &PendingImageRegistry {
        &self.registry
    }

    /// Accept an inserted image and return the reference to place in the body
    ///
    /// # Errors
    /// `ValidationError` if the image is rejected
    pub fn add_pending_image(&mut self, file: ImageFile) -> Result<TemporaryReference, ValidationError> {
        let reference = self.registry.add_pending_image(file)?;
        // The body carrying the new reference has not been observed yet
        self.observer.invalidate();
        Ok(reference)
    }

    /// Payload to render for a temporary reference
    #[inline]
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<&ImageFile> {
        self.registry.resolve(reference)
    }

    /// Content-change hook
    pub fn reconcile_on_content_change(&mut self, body: Option<&DocumentBody>) -> ReconcileOutcome {
        self.observer.on_content_change(&mut self.registry, body)
    }

    /// Materialize `body` without persisting it
    ///
    /// # Errors
    /// See [`Materializer::materialize`]
    pub async fn materialize(&mut self, body: &DocumentBody) -> Result<DocumentBody, MaterializeError> {
        let result = self.materializer.materialize(&mut self.registry, body).await;
        self.observer.invalidate();
        result
    }

    /// Validate, materialize and persist an episode
    ///
    /// On failure the registry keeps every entry the body still uses, so
    /// the same call can be retried.
    ///
    /// # Errors
    /// `SaveError` describing the first step that failed
    pub async fn save(
        &mut self,
        id: Option<EpisodeId>,
        metadata: EpisodeMetadata,
        body: &DocumentBody,
    ) -> Result<EpisodeRecord, SaveError> {
        let metadata = metadata.normalized()?;
        let body = self.materialize(body).await?;

        if let Some(leak) = body.temporary_references()?.into_iter().next() {
            tracing::error!(reference = %leak, "temporary reference survived materialization");
            return Err(SaveError::TemporaryReferenceLeak(leak));
        }

        let previous = match id {
            Some(id) => self.repository.load_episode(id).await?,
            None => None,
        };

        let record = self
            .repository
            .save_episode(EpisodeDraft {
                id,
                metadata,
                body,
            })
            .await?;
        tracing::info!(episode = %record.id, title = %record.metadata.title, "episode saved");

        let mut orphans = self.registry.take_abandoned_uploads();
        if let Some(previous) = previous {
            match find_orphaned_images(&previous.body, &record.body) {
                Ok(dropped) => orphans.extend(self.unshared(dropped, record.id).await),
                Err(e) => tracing::warn!(episode = %record.id, error = %e, "orphan detection skipped"),
            }
        }
        self.sweep(orphans).await;

        Ok(record)
    }

    /// Tear the session down, releasing every pending image
    pub async fn close(mut self) -> SweepReport {
        let released = self.registry.clear_all();
        let abandoned = self.registry.take_abandoned_uploads();
        tracing::debug!(released, abandoned = abandoned.len(), "editor session closed");
        self.sweep(abandoned).await
    }

    /// Images dropped from `episode` that no other episode uses
    ///
    /// A failed lookup keeps the image.
    async fn unshared(&self, dropped: Vec<DurableUrl>, episode: EpisodeId) -> Vec<DurableUrl> {
        let mut unshared = Vec::with_capacity(dropped.len());
        for url in dropped {
            match self.repository.references_image(&url, episode).await {
                Ok(false) => unshared.push(url),
                Ok(true) => tracing::debug!(url = %url, "image still used by another episode"),
                Err(e) => tracing::warn!(url = %url, error = %e, "image usage lookup failed, keeping it"),
            }
        }
        unshared
    }

    async fn sweep(&self, urls: Vec<DurableUrl>) -> SweepReport {
        if urls.is_empty() {
            return SweepReport::default();
        }
        self.sweeper.sweep(urls).await
    }
}

impl<S: ObjectStore + ?Sized, R: EpisodeRepository + ?Sized> std::fmt::Debug for EditorSession<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("pending", &self.registry.len())
            .finish_non_exhaustive()
    }
}
