//! Reconciliation of newly drawn highlight regions
//!
//! A drawn region that overlaps nothing becomes a highlight in place. A
//! region that overlaps existing highlights is collapsed with all of them
//! into one replacement highlight covering their union.

use crate::config::HighlightStyle;
use crate::deletion::ExpectedRemovals;
use crate::error::Result;
use crate::highlights::{normalize_quote, Highlight, HighlightCache, HighlightIdentity};
use crate::overlap::find_overlapping;
use crate::position::position_percent;
use crate::session::ViewHandle;
use crate::surface::{Annotation, AnnotationSurface};
use crate::sync::{
    CreateHighlightInput, MergeHighlightInput, PendingOperation, PendingWrite, SyncClient,
};

/// Result of reconciling one creation event
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// The annotation was not a new user-drawn highlight
    Ignored,
    /// A standalone highlight was created
    Created(Highlight),
    /// Overlapping highlights were replaced by this one
    Merged(Highlight),
}

/// Borrowed view of the session state a reconciliation touches
pub(crate) struct MergeEngine<'a, S: ?Sized, C: ?Sized> {
    pub surface: &'a S,
    pub client: &'a C,
    pub cache: &'a HighlightCache,
    pub article_id: &'a str,
    pub style: &'a HighlightStyle,
    pub removals: &'a mut ExpectedRemovals,
    pub drift: &'a mut Vec<PendingWrite>,
    pub view: &'a ViewHandle,
}

impl<'a, S, C> MergeEngine<'a, S, C>
where
    S: AnnotationSurface + ?Sized,
    C: SyncClient + ?Sized,
{
    pub async fn reconcile(&mut self, drawn: Annotation) -> Result<Reconciled> {
        // Annotations that already carry an identity are echoes of the
        // engine's own writes (load-time replay, merge replacement).
        if !drawn.is_highlight() || drawn.identity().is_some() {
            return Ok(Reconciled::Ignored);
        }

        let overlapping = find_overlapping(self.surface, drawn.page_index, &drawn.rects).await?;
        let quote = normalize_quote(&self.surface.markup_text(&drawn).await?);
        let identity = HighlightIdentity::generate(self.article_id, quote);

        tracing::debug!(
            highlight_id = %identity.id,
            page_index = drawn.page_index,
            overlaps = overlapping.len(),
            "Reconciling drawn region"
        );

        if overlapping.is_empty() {
            self.create(drawn, identity).await
        } else {
            self.merge(drawn, identity, overlapping).await
        }
    }

    async fn create(&mut self, drawn: Annotation, identity: HighlightIdentity) -> Result<Reconciled> {
        let claimed = self
            .surface
            .update(drawn.with_identity(identity.clone()))
            .await?;

        let patch = self.surface.to_patch(&claimed)?;
        let percent = position_percent(self.surface, claimed.page_index, claimed.bounding_box.top);
        let input = CreateHighlightInput::new(&identity, patch, percent, claimed.page_index);

        match self.client.create_highlight(input.clone()).await {
            Ok(confirmed) => {
                self.view.ensure_active()?;
                self.cache.insert(confirmed.clone()).await?;
                tracing::info!(highlight_id = %confirmed.id, "Created highlight");
                Ok(Reconciled::Created(confirmed))
            }
            Err(e) => {
                tracing::error!(highlight_id = %identity.id, "Failed to create highlight: {}", e);
                self.record_drift(PendingOperation::Create(input), &e);
                Err(e.into())
            }
        }
    }

    async fn merge(
        &mut self,
        drawn: Annotation,
        identity: HighlightIdentity,
        overlapping: Vec<Annotation>,
    ) -> Result<Reconciled> {
        let page_index = drawn.page_index;
        let mut rects = drawn.rects.clone();
        rects.extend(overlapping.iter().flat_map(|a| a.rects.iter().copied()));

        let replacement = Annotation::highlight(page_index, rects)
            .with_style(self.style.clone())
            .with_identity(identity.clone());
        let replacement = self.surface.create(replacement).await?;

        let mut subsumed: Vec<String> = Vec::with_capacity(overlapping.len());
        for id in overlapping.iter().filter_map(|a| a.highlight_id()) {
            if !subsumed.iter().any(|s| s == id) {
                subsumed.push(id.to_string());
            }
        }

        let mut replaced = overlapping;
        replaced.push(drawn);
        self.removals.expect(&replaced);
        if let Err(e) = self.surface.delete(&replaced).await {
            self.removals.forget(&replaced);
            self.withdraw(&replacement).await;
            return Err(e.into());
        }

        // Unconfirmed writes for subsumed highlights are superseded; the
        // originals of a superseded merge are subsumed by this one instead.
        for id in subsumed.clone() {
            for original in discard_pending(&mut *self.drift, &id) {
                if !subsumed.contains(&original) {
                    subsumed.push(original);
                }
            }
        }

        let patch = self.surface.to_patch(&replacement)?;
        let percent = position_percent(self.surface, page_index, replacement.bounding_box.top);
        let input = MergeHighlightInput {
            highlight: CreateHighlightInput::new(&identity, patch, percent, page_index),
            overlap_highlight_id_list: subsumed.clone(),
        };

        match self.client.merge_highlights(input.clone()).await {
            Ok(mut confirmed) => {
                self.view.ensure_active()?;
                if confirmed.merged_from_ids.is_empty() {
                    confirmed.merged_from_ids = subsumed.clone();
                }
                self.cache.apply_merge(&subsumed, confirmed.clone()).await?;
                tracing::info!(
                    highlight_id = %confirmed.id,
                    merged = subsumed.len(),
                    "Merged overlapping highlights"
                );
                Ok(Reconciled::Merged(confirmed))
            }
            Err(e) => {
                // The surface already shows the merged highlight; the cache
                // keeps the originals until a retry or reload.
                tracing::error!(highlight_id = %identity.id, "Failed to merge highlights: {}", e);
                self.record_drift(PendingOperation::Merge(input), &e);
                Err(e.into())
            }
        }
    }

    /// Remove a replacement annotation that could not take over its region
    async fn withdraw(&mut self, replacement: &Annotation) {
        let replacement = std::slice::from_ref(replacement);
        self.removals.expect(replacement);
        if let Err(e) = self.surface.delete(replacement).await {
            self.removals.forget(replacement);
            tracing::warn!(annotation_id = %replacement[0].id, "Failed to withdraw merge replacement: {}", e);
        }
    }

    fn record_drift(&mut self, operation: PendingOperation, error: &impl ToString) {
        if self.view.is_active() {
            self.drift.push(PendingWrite::new(operation, error.to_string()));
        }
    }
}

/// Drop unconfirmed writes for `highlight_id`.
///
/// Returns the ids a dropped merge was meant to replace; they are still
/// cached and still known to the remote store.
pub(crate) fn discard_pending(drift: &mut Vec<PendingWrite>, highlight_id: &str) -> Vec<String> {
    let mut replaced = Vec::new();
    drift.retain(|write| {
        if write.operation.highlight_id() != highlight_id {
            return true;
        }
        if let PendingOperation::Merge(input) = &write.operation {
            replaced.extend(input.overlap_highlight_id_list.iter().cloned());
        }
        false
    });
    replaced
}
