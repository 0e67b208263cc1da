//! Document view session
//!
//! A session is opened once per document view. It materializes the stored
//! highlights onto the surface, then reacts to surface events and deletion
//! requests one at a time: every handler runs to completion before the next
//! event is looked at, so no handler ever observes another's half-applied
//! cache mutation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

use crate::config::Config;
use crate::deletion::{DeletionListener, ExpectedRemovals};
use crate::error::{HighlightError, Result, SyncError};
use crate::highlights::{Article, Highlight, HighlightCache};
use crate::merge::{discard_pending, MergeEngine, Reconciled};
use crate::progress::{ProgressReporter, ReadingProgressTracker};
use crate::surface::{Annotation, AnnotationSurface, ChangeReason, SurfaceEvent, SurfaceLoader};
use crate::sync::{
    PendingOperation, PendingWrite, ReadingProgressInput, SyncClient, UpdateHighlightInput,
};

// ============================================================================
// View lifetime
// ============================================================================

/// Shared flag marking whether the document view is still open.
///
/// Remote calls that complete after teardown are not applied.
#[derive(Clone, Debug)]
pub struct ViewHandle {
    inner: Arc<ViewInner>,
}

#[derive(Debug)]
struct ViewInner {
    active: AtomicBool,
    closed: Notify,
}

impl Default for ViewHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ViewInner {
                active: AtomicBool::new(true),
                closed: Notify::new(),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(HighlightError::ViewClosed)
        }
    }

    /// Mark the view as torn down and wake the event loop
    pub fn teardown(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            self.inner.closed.notify_waiters();
        }
    }

    /// Resolves once the view has been torn down
    pub async fn closed(&self) {
        loop {
            let notified = self.inner.closed.notified();
            if !self.is_active() {
                return;
            }
            notified.await;
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// What handling a surface event did
#[derive(Debug)]
pub enum EventOutcome {
    Reconciled(Reconciled),
    /// Highlight ids removed after a surface deletion
    Deleted(Vec<String>),
    /// Reading progress update queued for the remote store, if progress
    /// increased
    Progress(Option<ReadingProgressInput>),
    /// The event carried nothing the engine acts on
    Skipped,
}

/// Highlight synchronization for one open document
pub struct HighlightSession<S, C> {
    article_id: String,
    article_slug: String,
    surface: S,
    client: Arc<C>,
    cache: HighlightCache,
    config: Config,
    progress: ReadingProgressTracker,
    reporter: ProgressReporter,
    removals: ExpectedRemovals,
    drift: Vec<PendingWrite>,
    view: ViewHandle,
}

impl<S, C> HighlightSession<S, C>
where
    S: AnnotationSurface + 'static,
    C: SyncClient + 'static,
{
    /// Load the surface and materialize the article's stored highlights.
    ///
    /// Highlights whose patch cannot be replayed are logged and skipped;
    /// they stay in the cache.
    pub async fn open<L>(loader: &L, article: Article, client: Arc<C>, config: Config) -> Result<Self>
    where
        L: SurfaceLoader<Surface = S>,
    {
        let surface = loader
            .load(&article.url, article.reading_progress_anchor_index)
            .await?;

        let cache = HighlightCache::new();
        cache.load(article.highlights.clone()).await;

        let session = Self {
            progress: ReadingProgressTracker::new(&article.id, article.reading_progress_percent),
            reporter: ProgressReporter::spawn(Arc::clone(&client)),
            article_id: article.id,
            article_slug: article.slug,
            surface,
            client,
            cache,
            config,
            removals: ExpectedRemovals::default(),
            drift: Vec::new(),
            view: ViewHandle::new(),
        };

        let replayed = session.materialize(&article.highlights).await;
        tracing::info!(
            article_id = %session.article_id,
            highlights = article.highlights.len(),
            replayed,
            "Opened document view"
        );

        Ok(session)
    }

    async fn materialize(&self, highlights: &[Highlight]) -> usize {
        let mut replayed = 0;
        for highlight in highlights {
            let annotation = match self.surface.from_patch(&highlight.patch) {
                Ok(annotation) => annotation,
                Err(e) => {
                    tracing::warn!(highlight_id = %highlight.id, "Skipping highlight with bad patch: {}", e);
                    continue;
                }
            };
            // The cached record is authoritative for identity and note
            let annotation = annotation.with_identity(highlight.identity());
            match self.surface.create(annotation).await {
                Ok(_) => replayed += 1,
                Err(e) => {
                    tracing::warn!(highlight_id = %highlight.id, "Failed to replay highlight: {}", e)
                }
            }
        }
        replayed
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn cache(&self) -> &HighlightCache {
        &self.cache
    }

    pub fn view(&self) -> &ViewHandle {
        &self.view
    }

    pub fn reading_progress(&self) -> f64 {
        self.progress.highest()
    }

    /// Writes the surface shows but the remote store has not confirmed
    pub fn pending_drift(&self) -> &[PendingWrite] {
        &self.drift
    }

    /// Wait until every queued reading progress update has been sent
    pub async fn flush_progress(&self) {
        self.reporter.flush().await;
    }

    /// Share link for a highlight
    pub fn highlight_url(&self, short_id: &str) -> String {
        format!(
            "{}/{}/{}/highlights/{}",
            self.config.share.web_base_url,
            self.config.share.viewer_username,
            self.article_slug,
            short_id
        )
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    pub async fn handle_event(&mut self, event: SurfaceEvent) -> Result<EventOutcome> {
        self.view.ensure_active()?;
        match event {
            SurfaceEvent::AnnotationsCreated { annotations } => {
                // Surfaces report one drawn region per creation event
                let Some(drawn) = annotations.into_iter().next() else {
                    return Ok(EventOutcome::Skipped);
                };
                let reconciled = self.engine().reconcile(drawn).await?;
                Ok(EventOutcome::Reconciled(reconciled))
            }
            SurfaceEvent::AnnotationsWillChange {
                reason: ChangeReason::DeleteEnd,
                annotations,
            } => self.on_surface_deletion(annotations).await.map(EventOutcome::Deleted),
            SurfaceEvent::AnnotationsWillChange { .. } => Ok(EventOutcome::Skipped),
            SurfaceEvent::CurrentPageChanged { page_index } => {
                let total_pages = self.surface.total_page_count();
                let update = self.progress.observe(page_index, total_pages);
                if let Some(input) = &update {
                    self.reporter.report(input.clone());
                }
                Ok(EventOutcome::Progress(update))
            }
        }
    }

    fn engine(&mut self) -> MergeEngine<'_, S, C> {
        MergeEngine {
            surface: &self.surface,
            client: self.client.as_ref(),
            cache: &self.cache,
            article_id: &self.article_id,
            style: &self.config.style,
            removals: &mut self.removals,
            drift: &mut self.drift,
            view: &self.view,
        }
    }

    /// The surface removed annotations; delete the highlights they carried.
    ///
    /// Removals the engine initiated itself are skipped. Every highlight is
    /// attempted; the first remote failure is returned.
    async fn on_surface_deletion(&mut self, annotations: Vec<Annotation>) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        let mut first_error = None;

        for annotation in annotations {
            if self.removals.take(&annotation.id) {
                continue;
            }
            let Some(highlight_id) = annotation.highlight_id() else {
                continue;
            };
            match self.forget_highlight(highlight_id).await {
                Ok(()) => deleted.push(highlight_id.to_string()),
                Err(HighlightError::Sync(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(deleted),
        }
    }

    /// Remote delete and cache removal for a highlight the surface no
    /// longer shows.
    ///
    /// Unconfirmed writes for the id are dropped. Originals an unconfirmed
    /// merge was meant to replace are deleted along with it.
    async fn forget_highlight(&mut self, highlight_id: &str) -> Result<()> {
        let mut ids = vec![highlight_id.to_string()];
        for id in discard_pending(&mut self.drift, highlight_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let mut first_error: Option<SyncError> = None;
        for id in &ids {
            let result = self.client.delete_highlight(id).await;
            self.view.ensure_active()?;
            self.cache.remove(id).await;

            match result {
                Ok(()) => tracing::info!(highlight_id = %id, "Deleted highlight"),
                Err(e) => {
                    tracing::error!(highlight_id = %id, "Failed to delete highlight: {}", e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Requests from other views
    // ========================================================================

    /// Surface annotations carrying `highlight_id`, across all pages
    async fn find_annotations(&self, highlight_id: &str) -> Result<Vec<Annotation>> {
        let mut found = Vec::new();
        for page_index in 0..self.surface.total_page_count() {
            let annotations = self.surface.annotations(page_index).await?;
            found.extend(
                annotations
                    .into_iter()
                    .filter(|a| a.highlight_id() == Some(highlight_id)),
            );
        }
        Ok(found)
    }

    /// Delete a highlight known only by id.
    ///
    /// Returns `false` when neither the surface nor the cache knows the id.
    pub async fn handle_deletion_request(&mut self, highlight_id: &str) -> Result<bool> {
        self.view.ensure_active()?;
        let annotations = self.find_annotations(highlight_id).await?;
        let known = self.cache.contains(highlight_id).await
            || self
                .drift
                .iter()
                .any(|w| w.operation.highlight_id() == highlight_id);
        if annotations.is_empty() && !known {
            tracing::debug!(highlight_id = %highlight_id, "Deletion requested for unknown highlight");
            return Ok(false);
        }

        if !annotations.is_empty() {
            self.removals.expect(&annotations);
            if let Err(e) = self.surface.delete(&annotations).await {
                self.removals.forget(&annotations);
                return Err(e.into());
            }
        }

        self.forget_highlight(highlight_id).await?;
        Ok(true)
    }

    /// Remove an annotation from the surface's tooltip action
    pub async fn delete_annotation(&mut self, annotation: &Annotation) -> Result<bool> {
        match annotation.highlight_id() {
            Some(highlight_id) => {
                let highlight_id = highlight_id.to_string();
                self.handle_deletion_request(&highlight_id).await
            }
            None => {
                self.surface.delete(std::slice::from_ref(annotation)).await?;
                Ok(false)
            }
        }
    }

    /// Replace the note attached to a highlight
    pub async fn update_note(&mut self, highlight_id: &str, note: Option<String>) -> Result<Highlight> {
        self.view.ensure_active()?;
        if !self.cache.contains(highlight_id).await {
            return Err(crate::error::CacheError::NotFound(highlight_id.to_string()).into());
        }

        let confirmed = self
            .client
            .update_highlight(highlight_id, UpdateHighlightInput { annotation: note })
            .await?;
        self.view.ensure_active()?;
        let updated = self
            .cache
            .update_note(highlight_id, confirmed.annotation.clone())
            .await?;

        // Keep the note shown by the surface in step with the cache
        for annotation in self.find_annotations(highlight_id).await? {
            let annotation = annotation.with_identity(updated.identity());
            if let Err(e) = self.surface.update(annotation).await {
                tracing::warn!(highlight_id = %highlight_id, "Failed to refresh note on surface: {}", e);
            }
        }

        Ok(updated)
    }

    /// Text under an annotation, for copying
    pub async fn annotation_text(&self, annotation: &Annotation) -> Result<String> {
        Ok(self.surface.markup_text(annotation).await?)
    }

    /// Re-issue writes the remote store failed to confirm.
    ///
    /// Returns how many were confirmed; failures stay pending.
    pub async fn retry_pending(&mut self) -> Result<usize> {
        self.view.ensure_active()?;
        let pending = std::mem::take(&mut self.drift);
        let mut confirmed = 0;

        for write in pending {
            let outcome = match &write.operation {
                PendingOperation::Create(input) => match self.client.create_highlight(input.clone()).await {
                    Ok(highlight) => self.cache.insert(highlight).await.map_err(HighlightError::from),
                    Err(e) => Err(e.into()),
                },
                PendingOperation::Merge(input) => match self.client.merge_highlights(input.clone()).await {
                    Ok(mut highlight) => {
                        if highlight.merged_from_ids.is_empty() {
                            highlight.merged_from_ids = input.overlap_highlight_id_list.clone();
                        }
                        self.cache
                            .apply_merge(&input.overlap_highlight_id_list, highlight)
                            .await
                            .map_err(HighlightError::from)
                    }
                    Err(e) => Err(e.into()),
                },
            };
            self.view.ensure_active()?;

            match outcome {
                Ok(()) => {
                    tracing::info!(highlight_id = %write.operation.highlight_id(), "Retried pending write");
                    confirmed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        highlight_id = %write.operation.highlight_id(),
                        "Pending write still failing: {}",
                        e
                    );
                    self.drift.push(PendingWrite::new(write.operation, e));
                }
            }
        }

        Ok(confirmed)
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Process surface events and deletion requests until the view is torn
    /// down or the surface stops sending events.
    ///
    /// Handler failures are logged; they never end the loop.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<SurfaceEvent>,
        mut deletions: DeletionListener,
    ) {
        let view = self.view.clone();
        let mut deletions_open = true;

        loop {
            tokio::select! {
                biased;
                _ = view.closed() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            tracing::error!("Failed to handle surface event: {}", e);
                        }
                    }
                    None => break,
                },
                request = deletions.recv(), if deletions_open => match request {
                    Some(highlight_id) => {
                        if let Err(e) = self.handle_deletion_request(&highlight_id).await {
                            tracing::error!(highlight_id = %highlight_id, "Failed to handle deletion request: {}", e);
                        }
                    }
                    None => deletions_open = false,
                },
            }
        }

        self.close().await;
    }

    /// Tear down the view and unload the surface.
    ///
    /// Queued reading progress updates are still sent.
    pub async fn close(&self) {
        self.view.teardown();
        self.reporter.flush().await;
        self.surface.unload().await;
        tracing::info!(article_id = %self.article_id, "Closed document view");
    }
}
