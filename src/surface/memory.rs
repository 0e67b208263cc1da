//! In-process annotation surface
//!
//! Keeps annotations per page in memory and fires the same events a
//! rendering engine would, including echoes of programmatic writes. Used by
//! the replay tool and the integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};

use super::{Annotation, AnnotationSurface, ChangeReason, SurfaceEvent, SurfaceLoader};
use crate::error::SurfaceError;
use crate::geometry::{PageGeometry, Rect};
use crate::highlights::HighlightPatch;

/// A run of document text with its position on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSpan {
    pub page_index: usize,
    pub rect: Rect,
    pub text: String,
}

/// Document description a [`MemorySurface`] is loaded from
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    page_heights: Vec<Option<f64>>,
    text: Vec<TextSpan>,
    events: Option<mpsc::UnboundedSender<SurfaceEvent>>,
}

impl MemoryDocument {
    pub fn new(page_heights: Vec<Option<f64>>) -> Self {
        Self {
            page_heights,
            text: Vec::new(),
            events: None,
        }
    }

    pub fn with_text(mut self, text: Vec<TextSpan>) -> Self {
        self.text = text;
        self
    }

    /// Deliver surface events to `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SurfaceEvent>) -> Self {
        self.events = Some(events);
        self
    }
}

#[async_trait]
impl SurfaceLoader for MemoryDocument {
    type Surface = MemorySurface;

    async fn load(
        &self,
        document_url: &str,
        initial_page_index: usize,
    ) -> Result<MemorySurface, SurfaceError> {
        let page_count = self.page_heights.len();
        let current_page = if page_count == 0 {
            0
        } else {
            initial_page_index.min(page_count - 1)
        };

        tracing::debug!(
            document_url = %document_url,
            pages = page_count,
            current_page,
            "Loaded memory surface"
        );

        Ok(MemorySurface {
            inner: Arc::new(SurfaceInner {
                page_heights: self.page_heights.clone(),
                text: self.text.clone(),
                events: self.events.clone(),
                state: RwLock::new(SurfaceState {
                    pages: vec![Vec::new(); page_count],
                    current_page,
                    loaded: true,
                }),
            }),
        })
    }
}

/// Cloneable handle to an in-memory surface
#[derive(Clone)]
pub struct MemorySurface {
    inner: Arc<SurfaceInner>,
}

struct SurfaceInner {
    page_heights: Vec<Option<f64>>,
    text: Vec<TextSpan>,
    events: Option<mpsc::UnboundedSender<SurfaceEvent>>,
    state: RwLock<SurfaceState>,
}

struct SurfaceState {
    pages: Vec<Vec<Annotation>>,
    current_page: usize,
    loaded: bool,
}

impl SurfaceState {
    fn page_mut(&mut self, page_index: usize) -> Result<&mut Vec<Annotation>, SurfaceError> {
        let count = self.pages.len();
        self.pages
            .get_mut(page_index)
            .ok_or(SurfaceError::PageOutOfRange {
                index: page_index,
                count,
            })
    }

    fn ensure_loaded(&self) -> Result<(), SurfaceError> {
        if self.loaded {
            Ok(())
        } else {
            Err(SurfaceError::Unloaded)
        }
    }
}

impl MemorySurface {
    fn emit(&self, event: SurfaceEvent) {
        if let Some(events) = &self.inner.events {
            // The receiver is gone once the view is torn down
            let _ = events.send(event);
        }
    }

    // ========================================================================
    // User actions
    // ========================================================================

    /// Draw a new highlight region, as a reader dragging over text would
    pub async fn draw(&self, page_index: usize, rects: Vec<Rect>) -> Result<Annotation, SurfaceError> {
        let annotation = Annotation::highlight(page_index, rects);
        {
            let mut state = self.inner.state.write().await;
            state.ensure_loaded()?;
            state.page_mut(page_index)?.push(annotation.clone());
        }
        self.emit(SurfaceEvent::AnnotationsCreated {
            annotations: vec![annotation.clone()],
        });
        Ok(annotation)
    }

    /// Remove an annotation through the surface's own UI
    pub async fn remove(&self, annotation_id: &str) -> Result<Annotation, SurfaceError> {
        let removed = {
            let mut state = self.inner.state.write().await;
            state.ensure_loaded()?;
            take_annotation(&mut state.pages, annotation_id)?
        };
        self.emit(SurfaceEvent::AnnotationsWillChange {
            reason: ChangeReason::DeleteEnd,
            annotations: vec![removed.clone()],
        });
        Ok(removed)
    }

    /// Scroll to a page
    pub async fn navigate(&self, page_index: usize) -> Result<(), SurfaceError> {
        {
            let mut state = self.inner.state.write().await;
            state.ensure_loaded()?;
            let count = state.pages.len();
            if page_index >= count {
                return Err(SurfaceError::PageOutOfRange {
                    index: page_index,
                    count,
                });
            }
            if state.current_page == page_index {
                return Ok(());
            }
            state.current_page = page_index;
        }
        self.emit(SurfaceEvent::CurrentPageChanged { page_index });
        Ok(())
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub async fn current_page(&self) -> usize {
        self.inner.state.read().await.current_page
    }

    pub async fn is_loaded(&self) -> bool {
        self.inner.state.read().await.loaded
    }

    /// Every annotation on every page
    pub async fn all_annotations(&self) -> Vec<Annotation> {
        let state = self.inner.state.read().await;
        state.pages.iter().flatten().cloned().collect()
    }
}

fn take_annotation(
    pages: &mut [Vec<Annotation>],
    annotation_id: &str,
) -> Result<Annotation, SurfaceError> {
    for page in pages.iter_mut() {
        if let Some(pos) = page.iter().position(|a| a.id == annotation_id) {
            return Ok(page.remove(pos));
        }
    }
    Err(SurfaceError::AnnotationNotFound(annotation_id.to_string()))
}

impl PageGeometry for MemorySurface {
    fn total_page_count(&self) -> usize {
        self.inner.page_heights.len()
    }

    fn page_height(&self, page_index: usize) -> Option<f64> {
        self.inner.page_heights.as_slice().page_height(page_index)
    }
}

#[async_trait]
impl AnnotationSurface for MemorySurface {
    async fn annotations(&self, page_index: usize) -> Result<Vec<Annotation>, SurfaceError> {
        let state = self.inner.state.read().await;
        state.ensure_loaded()?;
        state
            .pages
            .get(page_index)
            .cloned()
            .ok_or(SurfaceError::PageOutOfRange {
                index: page_index,
                count: state.pages.len(),
            })
    }

    async fn create(&self, annotation: Annotation) -> Result<Annotation, SurfaceError> {
        {
            let mut state = self.inner.state.write().await;
            state.ensure_loaded()?;
            state.page_mut(annotation.page_index)?.push(annotation.clone());
        }
        self.emit(SurfaceEvent::AnnotationsCreated {
            annotations: vec![annotation.clone()],
        });
        Ok(annotation)
    }

    async fn update(&self, annotation: Annotation) -> Result<Annotation, SurfaceError> {
        let mut state = self.inner.state.write().await;
        state.ensure_loaded()?;
        let page = state.page_mut(annotation.page_index)?;
        let slot = page
            .iter_mut()
            .find(|a| a.id == annotation.id)
            .ok_or_else(|| SurfaceError::AnnotationNotFound(annotation.id.clone()))?;
        *slot = annotation.clone();
        Ok(annotation)
    }

    async fn delete(&self, annotations: &[Annotation]) -> Result<(), SurfaceError> {
        if annotations.is_empty() {
            return Ok(());
        }
        let mut removed = Vec::with_capacity(annotations.len());
        {
            let mut state = self.inner.state.write().await;
            state.ensure_loaded()?;
            // All or nothing: a missing id leaves the page untouched
            if let Some(missing) = annotations
                .iter()
                .find(|a| !state.pages.iter().flatten().any(|existing| existing.id == a.id))
            {
                return Err(SurfaceError::AnnotationNotFound(missing.id.clone()));
            }
            for annotation in annotations {
                removed.push(take_annotation(&mut state.pages, &annotation.id)?);
            }
        }
        self.emit(SurfaceEvent::AnnotationsWillChange {
            reason: ChangeReason::DeleteEnd,
            annotations: removed,
        });
        Ok(())
    }

    async fn markup_text(&self, annotation: &Annotation) -> Result<String, SurfaceError> {
        let lines: Vec<&str> = self
            .inner
            .text
            .iter()
            .filter(|span| span.page_index == annotation.page_index)
            .filter(|span| annotation.rects.iter().any(|r| r.overlaps(&span.rect)))
            .map(|span| span.text.as_str())
            .collect();
        Ok(lines.join("\n"))
    }

    fn to_patch(&self, annotation: &Annotation) -> Result<HighlightPatch, SurfaceError> {
        serde_json::to_string(annotation)
            .map(HighlightPatch::new)
            .map_err(|e| SurfaceError::InvalidPatch(e.to_string()))
    }

    fn from_patch(&self, patch: &HighlightPatch) -> Result<Annotation, SurfaceError> {
        serde_json::from_str(patch.as_str()).map_err(|e| SurfaceError::InvalidPatch(e.to_string()))
    }

    async fn unload(&self) {
        let mut state = self.inner.state.write().await;
        state.loaded = false;
        state.pages.iter_mut().for_each(Vec::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn load(heights: Vec<Option<f64>>) -> (MemorySurface, mpsc::UnboundedReceiver<SurfaceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let surface = MemoryDocument::new(heights)
            .with_events(tx)
            .load("memory://doc", 0)
            .await
            .unwrap();
        (surface, rx)
    }

    #[tokio::test]
    async fn test_draw_fires_creation_event() {
        let (surface, mut rx) = load(vec![Some(100.0), Some(100.0)]).await;
        let drawn = surface
            .draw(1, vec![Rect::new(0.0, 0.0, 10.0, 10.0)])
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            SurfaceEvent::AnnotationsCreated { annotations } => {
                assert_eq!(annotations, vec![drawn]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(surface.annotations(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_fires_delete_end() {
        let (surface, mut rx) = load(vec![Some(100.0)]).await;
        let drawn = surface
            .draw(0, vec![Rect::new(0.0, 0.0, 10.0, 10.0)])
            .await
            .unwrap();
        let _ = rx.try_recv();

        surface.delete(std::slice::from_ref(&drawn)).await.unwrap();
        match rx.try_recv().unwrap() {
            SurfaceEvent::AnnotationsWillChange { reason, annotations } => {
                assert_eq!(reason, ChangeReason::DeleteEnd);
                assert_eq!(annotations[0].id, drawn.id);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(surface.all_annotations().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_with_missing_id_removes_nothing() {
        let (surface, mut rx) = load(vec![Some(100.0)]).await;
        let kept = surface
            .draw(0, vec![Rect::new(0.0, 0.0, 10.0, 10.0)])
            .await
            .unwrap();
        let _ = rx.try_recv();
        let never_added = Annotation::highlight(0, vec![Rect::new(5.0, 5.0, 1.0, 1.0)]);

        let err = surface
            .delete(&[kept.clone(), never_added.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, SurfaceError::AnnotationNotFound(id) if id == never_added.id));
        assert_eq!(surface.all_annotations().await, vec![kept]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_patch_round_trip() {
        let (surface, _rx) = load(vec![Some(100.0)]).await;
        let annotation = Annotation::highlight(0, vec![Rect::new(1.0, 2.0, 3.0, 4.0)]);
        let patch = surface.to_patch(&annotation).unwrap();
        assert_eq!(surface.from_patch(&patch).unwrap(), annotation);

        let err = surface.from_patch(&HighlightPatch::new("not json")).unwrap_err();
        assert!(matches!(err, SurfaceError::InvalidPatch(_)));
    }

    #[tokio::test]
    async fn test_markup_text_joins_lines() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let surface = MemoryDocument::new(vec![Some(100.0)])
            .with_text(vec![
                TextSpan {
                    page_index: 0,
                    rect: Rect::new(0.0, 0.0, 50.0, 5.0),
                    text: "first line".to_string(),
                },
                TextSpan {
                    page_index: 0,
                    rect: Rect::new(0.0, 6.0, 50.0, 5.0),
                    text: "second line".to_string(),
                },
                TextSpan {
                    page_index: 0,
                    rect: Rect::new(0.0, 60.0, 50.0, 5.0),
                    text: "elsewhere".to_string(),
                },
            ])
            .with_events(tx)
            .load("memory://doc", 0)
            .await
            .unwrap();

        let annotation = Annotation::highlight(0, vec![Rect::new(0.0, 0.0, 50.0, 12.0)]);
        let text = surface.markup_text(&annotation).await.unwrap();
        assert_eq!(text, "first line\nsecond line");
    }

    #[tokio::test]
    async fn test_unload_rejects_operations() {
        let (surface, _rx) = load(vec![Some(100.0)]).await;
        surface.unload().await;
        assert!(!surface.is_loaded().await);
        let err = surface.annotations(0).await.unwrap_err();
        assert!(matches!(err, SurfaceError::Unloaded));
    }

    #[tokio::test]
    async fn test_navigate_fires_page_change_once() {
        let (surface, mut rx) = load(vec![Some(100.0), Some(100.0)]).await;
        surface.navigate(1).await.unwrap();
        surface.navigate(1).await.unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            SurfaceEvent::CurrentPageChanged { page_index: 1 }
        );
        assert!(rx.try_recv().is_err());
        assert!(surface.navigate(5).await.is_err());
    }
}
