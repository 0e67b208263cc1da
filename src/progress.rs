//! Reading progress tracking
//!
//! Progress only moves forward within a document view: navigating back to
//! an earlier page never produces an update. Updates reach the remote store
//! in the order they were observed.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::sync::{ReadingProgressInput, SyncClient};

/// Completion percentage for having reached `page_index`
pub fn page_progress_percent(page_index: usize, total_pages: usize) -> Option<f64> {
    if total_pages == 0 {
        return None;
    }
    let percent = (page_index as f64 + 1.0) / total_pages as f64 * 100.0;
    Some(percent.clamp(0.0, 100.0))
}

/// Highest progress observed for one article during a session
#[derive(Debug, Clone)]
pub struct ReadingProgressTracker {
    article_id: String,
    highest: f64,
}

impl ReadingProgressTracker {
    /// Start tracking from the progress already stored for the article
    pub fn new(article_id: &str, stored_percent: f64) -> Self {
        let highest = if stored_percent.is_finite() {
            stored_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            article_id: article_id.to_string(),
            highest,
        }
    }

    pub fn highest(&self) -> f64 {
        self.highest
    }

    /// Record navigation to `page_index`.
    ///
    /// Returns the update to send when progress strictly increased.
    pub fn observe(&mut self, page_index: usize, total_pages: usize) -> Option<ReadingProgressInput> {
        let percent = page_progress_percent(page_index, total_pages)?;
        if percent <= self.highest {
            return None;
        }
        self.highest = percent;
        Some(ReadingProgressInput {
            id: self.article_id.clone(),
            reading_progress_percent: percent,
            reading_progress_anchor_index: page_index,
        })
    }
}

#[derive(Debug)]
enum ProgressMessage {
    Update(ReadingProgressInput),
    Flush(oneshot::Sender<()>),
}

/// Sends progress updates from a single background worker.
///
/// Callers never wait on the remote store. Failures are logged and not
/// retried. The worker exits once the reporter is dropped and its queue is
/// drained.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressMessage>,
}

impl ProgressReporter {
    /// Start the worker on the current runtime
    pub fn spawn<C>(client: Arc<C>) -> Self
    where
        C: SyncClient + ?Sized + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    ProgressMessage::Update(input) => {
                        let percent = input.reading_progress_percent;
                        let page_index = input.reading_progress_anchor_index;
                        match client.update_reading_progress(input).await {
                            Ok(()) => tracing::debug!(percent, page_index, "Reading progress saved"),
                            Err(e) => tracing::warn!(
                                percent,
                                page_index,
                                "Failed to save reading progress: {}",
                                e
                            ),
                        }
                    }
                    ProgressMessage::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { tx }
    }

    /// Queue an update behind every earlier one
    pub fn report(&self, input: ReadingProgressInput) {
        if self.tx.send(ProgressMessage::Update(input)).is_err() {
            tracing::warn!("Progress worker stopped, update dropped");
        }
    }

    /// Wait until every update queued so far has been sent
    pub async fn flush(&self) {
        let (done, waiter) = oneshot::channel();
        if self.tx.send(ProgressMessage::Flush(done)).is_ok() {
            let _ = waiter.await;
        }
    }
}
