//! Remote store payloads
//!
//! Field names follow the remote store's JSON API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::highlights::{Highlight, HighlightIdentity, HighlightPatch};

/// Request to persist a new highlight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHighlightInput {
    pub id: String,
    pub short_id: String,
    pub article_id: String,
    pub quote: String,
    pub prefix: String,
    pub suffix: String,
    pub patch: HighlightPatch,
    #[serde(rename = "highlightPositionPercent")]
    pub position_percent: f64,
    #[serde(rename = "highlightPositionAnchorIndex")]
    pub position_anchor_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl CreateHighlightInput {
    pub fn new(
        identity: &HighlightIdentity,
        patch: HighlightPatch,
        position_percent: f64,
        position_anchor_index: usize,
    ) -> Self {
        Self {
            id: identity.id.clone(),
            short_id: identity.short_id.clone(),
            article_id: identity.article_id.clone(),
            quote: identity.quote.clone(),
            prefix: identity.prefix.clone(),
            suffix: identity.suffix.clone(),
            patch,
            position_percent,
            position_anchor_index,
            annotation: identity.annotation.clone(),
        }
    }

    /// The record the remote store is expected to confirm
    pub fn to_highlight(&self, merged_from_ids: Vec<String>) -> Highlight {
        let now = Utc::now();
        Highlight {
            id: self.id.clone(),
            short_id: self.short_id.clone(),
            article_id: self.article_id.clone(),
            quote: self.quote.clone(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            patch: self.patch.clone(),
            position_percent: self.position_percent,
            position_anchor_index: self.position_anchor_index,
            annotation: self.annotation.clone(),
            merged_from_ids,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to replace overlapping highlights with one new highlight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeHighlightInput {
    #[serde(flatten)]
    pub highlight: CreateHighlightInput,
    /// Ids of the highlights being replaced
    pub overlap_highlight_id_list: Vec<String>,
}

/// Partial update of a highlight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateHighlightInput {
    /// New note; `None` clears it
    pub annotation: Option<String>,
}

/// Reading progress report for an article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgressInput {
    /// Article id
    pub id: String,
    pub reading_progress_percent: f64,
    pub reading_progress_anchor_index: usize,
}

/// Write that the remote store did not confirm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PendingOperation {
    Create(CreateHighlightInput),
    Merge(MergeHighlightInput),
}

impl PendingOperation {
    pub fn highlight_id(&self) -> &str {
        match self {
            PendingOperation::Create(input) => &input.id,
            PendingOperation::Merge(input) => &input.highlight.id,
        }
    }
}

/// Entry of the drift ledger: the surface shows a highlight the remote
/// store and the cache do not have yet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingWrite {
    pub operation: PendingOperation,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl PendingWrite {
    pub fn new(operation: PendingOperation, error: impl ToString) -> Self {
        Self {
            operation,
            error: error.to_string(),
            failed_at: Utc::now(),
        }
    }
}
