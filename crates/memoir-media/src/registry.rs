//! Pending image registry
//!
//! Single source of truth for images inserted into the document but not
//! yet durably stored, scoped to one editing session. Entries are kept in
//! insertion order so commits upload deterministically.

use crate::error::ValidationError;
use crate::validation::{validate_image, ImageFile, ImageMediaType, UploadLimits};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use memoir_document::{DurableUrl, TemporaryReference};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Process-local identifier of a pending image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingImageId(pub Ulid);

impl PendingImageId {
    /// Generate new pending image ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PendingImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PendingImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An image inserted into the document but not yet committed
#[derive(Debug, Clone)]
pub struct PendingImage {
    /// Local identifier
    pub id: PendingImageId,
    /// Raw payload
    pub file: ImageFile,
    /// Validated media type
    pub media_type: ImageMediaType,
    /// Handle inserted into the document
    pub reference: TemporaryReference,
    /// Insertion time
    pub inserted_at: DateTime<Utc>,
    /// Durable URL if a previous, failed commit already uploaded it
    pub uploaded: Option<DurableUrl>,
}

/// Registry of pending images for one editing session
#[derive(Debug)]
pub struct PendingImageRegistry {
    entries: IndexMap<TemporaryReference, PendingImage>,
    limits: UploadLimits,
    origin: String,
    /// Uploads whose entry was removed before a successful commit
    abandoned: Vec<DurableUrl>,
}

impl PendingImageRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new(limits: UploadLimits, origin: impl Into<String>) -> Self {
        Self {
            entries: IndexMap::new(),
            limits,
            origin: origin.into(),
            abandoned: Vec::new(),
        }
    }

    /// Validate `file` and register it under a fresh temporary reference
    ///
    /// The returned reference is what the editor inserts into the document.
    ///
    /// # Errors
    /// `ValidationError` if the file is rejected; nothing is registered
    pub fn add_pending_image(&mut self, file: ImageFile) -> Result<TemporaryReference, ValidationError> {
        let media_type = validate_image(&file, &self.limits).map_err(|e| {
            tracing::debug!(file = file.name(), error = %e, "image rejected");
            e
        })?;

        let reference = TemporaryReference::generate(&self.origin);
        let image = PendingImage {
            id: PendingImageId::new(),
            file,
            media_type,
            reference: reference.clone(),
            inserted_at: Utc::now(),
            uploaded: None,
        };
        tracing::debug!(
            id = %image.id,
            reference = %reference,
            file = image.file.name(),
            bytes = image.file.len(),
            "pending image added"
        );
        self.entries.insert(reference.clone(), image);
        Ok(reference)
    }

    /// Remove and release the entry for `reference`
    ///
    /// Removing an absent reference is a no-op.
    pub fn remove_pending_image(&mut self, reference: &str) -> Option<PendingImage> {
        let image = self.entries.shift_remove(reference)?;
        if let Some(url) = &image.uploaded {
            self.abandoned.push(url.clone());
        }
        tracing::debug!(reference = %image.reference, file = image.file.name(), "pending image released");
        Some(image)
    }

    /// Release every entry, returning how many were released
    ///
    /// Entries already uploaded by a failed commit become abandoned uploads.
    pub fn clear_all(&mut self) -> usize {
        let released = self.entries.len();
        self.abandoned
            .extend(self.entries.drain(..).filter_map(|(_, image)| image.uploaded));
        if released > 0 {
            tracing::debug!(released, "pending images cleared");
        }
        released
    }

    /// Drop every entry after a successful commit
    ///
    /// Uploaded entries are now referenced by the committed body, so none
    /// of them is abandoned.
    pub(crate) fn finish_commit(&mut self) -> usize {
        let committed = self.entries.len();
        self.entries.clear();
        committed
    }

    /// Record the durable URL of an entry uploaded during a commit
    pub(crate) fn mark_uploaded(&mut self, reference: &str, url: DurableUrl) {
        if let Some(image) = self.entries.get_mut(reference) {
            image.uploaded = Some(url);
        }
    }

    /// Payload behind a temporary reference, while it is still pending
    #[inline]
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<&ImageFile> {
        self.entries.get(reference).map(|image| &image.file)
    }

    /// Pending entry for a reference
    #[inline]
    #[must_use]
    pub fn get(&self, reference: &str) -> Option<&PendingImage> {
        self.entries.get(reference)
    }

    /// Whether `reference` is pending
    #[inline]
    #[must_use]
    pub fn contains(&self, reference: &str) -> bool {
        self.entries.contains_key(reference)
    }

    /// Pending references in insertion order
    pub fn references(&self) -> impl Iterator<Item = &TemporaryReference> {
        self.entries.keys()
    }

    /// Pending entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &PendingImage> {
        self.entries.values()
    }

    /// Number of pending images
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Limits applied on insertion
    #[inline]
    #[must_use]
    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Take durable URLs of uploads that will never be committed
    pub fn take_abandoned_uploads(&mut self) -> Vec<DurableUrl> {
        std::mem::take(&mut self.abandoned)
    }
}

impl Default for PendingImageRegistry {
    fn default() -> Self {
        Self::new(UploadLimits::default(), "memoir")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(name: &str) -> ImageFile {
        ImageFile::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF])
    }

    #[test]
    fn add_returns_resolvable_reference() {
        let mut registry = PendingImageRegistry::default();
        let reference = registry.add_pending_image(jpeg("a.jpg")).unwrap();

        assert!(reference.as_str().starts_with("blob:memoir/"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve(reference.as_str()).unwrap().name(), "a.jpg");
    }

    #[test]
    fn rejected_file_is_not_registered() {
        let mut registry = PendingImageRegistry::default();
        let pdf = ImageFile::new("a.pdf", "application/pdf", vec![1]);

        assert!(registry.add_pending_image(pdf).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_is_idempotent_and_releases() {
        let mut registry = PendingImageRegistry::default();
        let reference = registry.add_pending_image(jpeg("a.jpg")).unwrap();

        assert!(registry.remove_pending_image(reference.as_str()).is_some());
        assert!(registry.remove_pending_image(reference.as_str()).is_none());
        assert!(registry.resolve(reference.as_str()).is_none());
    }

    #[test]
    fn references_keep_insertion_order() {
        let mut registry = PendingImageRegistry::default();
        let a = registry.add_pending_image(jpeg("a.jpg")).unwrap();
        let b = registry.add_pending_image(jpeg("b.jpg")).unwrap();
        let c = registry.add_pending_image(jpeg("c.jpg")).unwrap();
        registry.remove_pending_image(b.as_str());

        let order: Vec<_> = registry.references().cloned().collect();
        assert_eq!(order, vec![a, c]);
    }

    #[test]
    fn clear_all_reports_abandoned_uploads() {
        let mut registry = PendingImageRegistry::default();
        let a = registry.add_pending_image(jpeg("a.jpg")).unwrap();
        registry.add_pending_image(jpeg("b.jpg")).unwrap();
        registry.mark_uploaded(a.as_str(), DurableUrl::new("https://cdn.test/a.jpg"));

        assert_eq!(registry.clear_all(), 2);
        assert!(registry.is_empty());
        assert_eq!(
            registry.take_abandoned_uploads(),
            vec![DurableUrl::new("https://cdn.test/a.jpg")]
        );
        assert!(registry.take_abandoned_uploads().is_empty());
    }

    #[test]
    fn finish_commit_abandons_nothing() {
        let mut registry = PendingImageRegistry::default();
        let a = registry.add_pending_image(jpeg("a.jpg")).unwrap();
        registry.mark_uploaded(a.as_str(), DurableUrl::new("https://cdn.test/a.jpg"));

        assert_eq!(registry.finish_commit(), 1);
        assert!(registry.take_abandoned_uploads().is_empty());
    }
}
