//! Remote store interface

use async_trait::async_trait;

use super::types::{
    CreateHighlightInput, MergeHighlightInput, ReadingProgressInput, UpdateHighlightInput,
};
use crate::error::SyncError;
use crate::highlights::Highlight;

/// Client for the remote highlight store
///
/// Calls are never retried by the engine; a failure is returned to the
/// caller and the local view is left as it is.
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// Persist a new highlight and return the confirmed record
    async fn create_highlight(&self, input: CreateHighlightInput) -> Result<Highlight, SyncError>;

    /// Persist a highlight that replaces the listed overlapping highlights
    async fn merge_highlights(&self, input: MergeHighlightInput) -> Result<Highlight, SyncError>;

    async fn delete_highlight(&self, highlight_id: &str) -> Result<(), SyncError>;

    /// Update the note of a highlight
    async fn update_highlight(
        &self,
        highlight_id: &str,
        input: UpdateHighlightInput,
    ) -> Result<Highlight, SyncError>;

    async fn update_reading_progress(&self, input: ReadingProgressInput) -> Result<(), SyncError>;
}
