//! Orphaned image cleanup
//!
//! When an update drops durable images from an episode body, or an upload
//! is abandoned before any commit references it, the stored object is no
//! longer referenced. The sweep deletes such objects on a best-effort
//! basis: failures are reported, never raised.

use crate::storage::ObjectStore;
use memoir_document::{DocumentBody, DocumentError, DurableUrl};
use std::sync::Arc;

/// Durable image sources in `previous` that `next` no longer uses
///
/// # Errors
/// `DocumentError` if either body cannot be parsed
pub fn find_orphaned_images(
    previous: &DocumentBody,
    next: &DocumentBody,
) -> Result<Vec<DurableUrl>, DocumentError> {
    let kept = next.durable_sources()?;
    Ok(previous
        .durable_sources()?
        .into_iter()
        .filter(|src| !kept.contains(src))
        .map(DurableUrl::new)
        .collect())
}

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Objects deleted (or already gone)
    pub deleted: Vec<DurableUrl>,
    /// URLs outside the store, left alone
    pub foreign: Vec<DurableUrl>,
    /// Deletions that failed
    pub failed: Vec<DurableUrl>,
}

impl SweepReport {
    /// Whether nothing was attempted
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.foreign.is_empty() && self.failed.is_empty()
    }
}

/// Deletes unreferenced objects from a store
#[derive(Debug)]
pub struct OrphanSweeper<S: ObjectStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ObjectStore + ?Sized> OrphanSweeper<S> {
    /// Create sweeper over `store`
    #[inline]
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Delete every URL the store owns
    pub async fn sweep(&self, urls: impl IntoIterator<Item = DurableUrl>) -> SweepReport {
        let mut report = SweepReport::default();
        for url in urls {
            if !self.store.owns(url.as_str()) {
                tracing::debug!(url = %url, "skipping foreign image");
                report.foreign.push(url);
                continue;
            }
            match self.store.delete(&url).await {
                Ok(()) => report.deleted.push(url),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "orphan cleanup failed");
                    report.failed.push(url);
                }
            }
        }
        if !report.is_empty() {
            tracing::info!(
                deleted = report.deleted.len(),
                foreign = report.foreign.len(),
                failed = report.failed.len(),
                "orphan sweep finished"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MockObjectStore;

    #[test]
    fn orphans_are_removed_durable_images() {
        let previous = DocumentBody::html(
            "<img src=\"https://cdn.test/a.jpg\"><img src=\"https://cdn.test/b.jpg\">\
             <img src=\"data:image/png;base64,AAAA\">",
        );
        let next = DocumentBody::markdown("![a](https://cdn.test/a.jpg)\n");

        // Format may change between versions; sources are compared as strings
        let orphans = find_orphaned_images(&previous, &next).unwrap();
        assert_eq!(orphans, vec![DurableUrl::new("https://cdn.test/b.jpg")]);
    }

    #[test]
    fn no_orphans_when_images_kept() {
        let body = DocumentBody::html("<img src=\"https://cdn.test/a.jpg\">");
        assert!(find_orphaned_images(&body, &body).unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_is_best_effort() {
        let mut store = MockObjectStore::new();
        store
            .expect_owns()
            .returning(|url| url.starts_with("https://cdn.test/"));
        store
            .expect_delete()
            .withf(|url| url.as_str().ends_with("ok.jpg"))
            .returning(|_| Ok(()));
        store
            .expect_delete()
            .withf(|url| url.as_str().ends_with("broken.jpg"))
            .returning(|_| Err(StorageError::Backend("timeout".to_string())));

        let sweeper = OrphanSweeper::new(Arc::new(store));
        let report = sweeper
            .sweep([
                DurableUrl::new("https://cdn.test/ok.jpg"),
                DurableUrl::new("https://cdn.test/broken.jpg"),
                DurableUrl::new("https://flickr.test/x.jpg"),
            ])
            .await;

        assert_eq!(report.deleted, vec![DurableUrl::new("https://cdn.test/ok.jpg")]);
        assert_eq!(report.failed, vec![DurableUrl::new("https://cdn.test/broken.jpg")]);
        assert_eq!(report.foreign, vec![DurableUrl::new("https://flickr.test/x.jpg")]);
    }
}
