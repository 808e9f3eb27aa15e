//! Document mutation observer
//!
//! Runs on every content change and prunes registry entries whose
//! temporary reference no longer backs any image node. It never uploads
//! and never adds entries.

use crate::registry::PendingImageRegistry;
use memoir_document::{ContentHash, DocumentBody, TemporaryReference};

/// Why a reconciliation did nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No document to diff against (editor not initialized)
    NoDocument,
    /// The body could not be parsed; nothing is pruned
    Unparseable(String),
    /// Same content as the last reconciled body
    AlreadyReconciled,
}

/// Outcome of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Silent no-op
    Skipped(SkipReason),
    /// Every pending reference is still in use
    Unchanged,
    /// These references were released
    Pruned(Vec<TemporaryReference>),
}

impl ReconcileOutcome {
    /// References released by this reconciliation
    #[must_use]
    pub fn pruned(&self) -> &[TemporaryReference] {
        match self {
            Self::Pruned(refs) => refs,
            _ => &[],
        }
    }
}

/// Bring `registry` in line with the image nodes of `body`
///
/// An entry survives while at least one image node uses its reference.
pub fn reconcile(registry: &mut PendingImageRegistry, body: Option<&DocumentBody>) -> ReconcileOutcome {
    let Some(body) = body else {
        return ReconcileOutcome::Skipped(SkipReason::NoDocument);
    };
    if registry.is_empty() {
        return ReconcileOutcome::Unchanged;
    }

    let in_use = match body.temporary_references() {
        Ok(refs) => refs,
        Err(e) => {
            tracing::warn!(error = %e, "reconciliation skipped: body not parseable");
            return ReconcileOutcome::Skipped(SkipReason::Unparseable(e.to_string()));
        }
    };

    let stale: Vec<TemporaryReference> = registry
        .references()
        .filter(|reference| !in_use.contains(*reference))
        .cloned()
        .collect();

    if stale.is_empty() {
        return ReconcileOutcome::Unchanged;
    }
    for reference in &stale {
        registry.remove_pending_image(reference.as_str());
    }
    tracing::debug!(pruned = stale.len(), remaining = registry.len(), "registry reconciled");
    ReconcileOutcome::Pruned(stale)
}

/// Content-change hook that skips bodies it has already reconciled
#[derive(Debug, Default)]
pub struct MutationObserver {
    last_seen: Option<ContentHash>,
}

impl MutationObserver {
    /// Create observer with no history
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile `registry` against `body` unless the body is unchanged
    pub fn on_content_change(
        &mut self,
        registry: &mut PendingImageRegistry,
        body: Option<&DocumentBody>,
    ) -> ReconcileOutcome {
        let Some(body) = body else {
            return reconcile(registry, None);
        };

        let hash = body.content_hash();
        if self.last_seen == Some(hash) {
            return ReconcileOutcome::Skipped(SkipReason::AlreadyReconciled);
        }

        let outcome = reconcile(registry, Some(body));
        // Unparseable bodies are retried on the next event
        if !matches!(outcome, ReconcileOutcome::Skipped(SkipReason::Unparseable(_))) {
            self.last_seen = Some(hash);
        }
        outcome
    }

    /// Forget the last reconciled body
    ///
    /// Needed after the registry changes outside of a content change,
    /// e.g. an insertion whose body update has not arrived yet.
    #[inline]
    pub fn invalidate(&mut self) {
        self.last_seen = None;
    }
}
