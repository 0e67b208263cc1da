//! In-process highlight cache
//!
//! The authoritative local view of an article's highlights, shared between
//! the session and any list view. Every mutation takes the write lock once,
//! so a merge never exposes both the replaced and the replacement records.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::Highlight;
use crate::error::CacheError;

/// Cloneable handle to the highlight cache
#[derive(Clone)]
pub struct HighlightCache {
    inner: Arc<RwLock<CacheInner>>,
}

struct CacheInner {
    highlights: HashMap<String, Highlight>,
    /// Changes whenever a list view must re-read the cache
    reload_key: Uuid,
}

impl Default for HighlightCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HighlightCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                highlights: HashMap::new(),
                reload_key: Uuid::new_v4(),
            })),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, id: &str) -> Option<Highlight> {
        self.inner.read().await.highlights.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.highlights.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.highlights.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.highlights.is_empty()
    }

    /// All highlights in document order
    pub async fn list_by_position(&self) -> Vec<Highlight> {
        let inner = self.inner.read().await;
        let mut highlights: Vec<Highlight> = inner.highlights.values().cloned().collect();
        highlights.sort_by(|a, b| {
            a.position_percent
                .total_cmp(&b.position_percent)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        highlights
    }

    pub async fn reload_key(&self) -> Uuid {
        self.inner.read().await.reload_key
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Bulk insert of records fetched from the remote store.
    ///
    /// Later duplicates of an id are skipped; returns how many were inserted.
    pub async fn load(&self, highlights: Vec<Highlight>) -> usize {
        let mut inner = self.inner.write().await;
        let mut inserted = 0;
        for highlight in highlights {
            if inner.highlights.contains_key(&highlight.id) {
                tracing::warn!(highlight_id = %highlight.id, "Skipping duplicate highlight on load");
                continue;
            }
            inner.highlights.insert(highlight.id.clone(), highlight);
            inserted += 1;
        }
        inserted
    }

    /// Insert a newly created highlight
    pub async fn insert(&self, highlight: Highlight) -> Result<(), CacheError> {
        let mut inner = self.inner.write().await;
        if inner.highlights.contains_key(&highlight.id) {
            return Err(CacheError::DuplicateId(highlight.id));
        }
        inner.highlights.insert(highlight.id.clone(), highlight);
        Ok(())
    }

    /// Replace the subsumed highlights with the merge result in one step.
    ///
    /// Subsumed ids that are not cached are ignored.
    pub async fn apply_merge(
        &self,
        subsumed_ids: &[String],
        merged: Highlight,
    ) -> Result<(), CacheError> {
        let mut inner = self.inner.write().await;
        if inner.highlights.contains_key(&merged.id) && !subsumed_ids.contains(&merged.id) {
            return Err(CacheError::DuplicateId(merged.id));
        }
        for id in subsumed_ids {
            inner.highlights.remove(id);
        }
        inner.highlights.insert(merged.id.clone(), merged);
        Ok(())
    }

    /// Replace the note of a cached highlight
    pub async fn update_note(
        &self,
        id: &str,
        annotation: Option<String>,
    ) -> Result<Highlight, CacheError> {
        let mut inner = self.inner.write().await;
        let highlight = inner
            .highlights
            .get_mut(id)
            .ok_or_else(|| CacheError::NotFound(id.to_string()))?;
        highlight.annotation = annotation;
        highlight.updated_at = Utc::now();
        Ok(highlight.clone())
    }

    /// Remove a highlight and signal list views to reload
    pub async fn remove(&self, id: &str) -> Option<Highlight> {
        let mut inner = self.inner.write().await;
        let removed = inner.highlights.remove(id);
        inner.reload_key = Uuid::new_v4();
        removed
    }
}
