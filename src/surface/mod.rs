//! Annotation surface interface
//!
//! The surface renders the paginated document and owns the visual
//! annotation overlays. The engine only reads page geometry and annotations,
//! issues create/update/delete commands, and reacts to the events the
//! surface fires.

mod memory;

pub use memory::{MemoryDocument, MemorySurface, TextSpan};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::HighlightStyle;
use crate::error::SurfaceError;
use crate::geometry::{PageGeometry, Rect};
use crate::highlights::{HighlightIdentity, HighlightPatch};

/// Kind of a surface annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Ink,
    Note,
    Other,
}

/// A visual annotation as the surface reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Surface-local identifier, unrelated to the highlight id
    pub id: String,
    pub kind: AnnotationKind,
    pub page_index: usize,
    pub rects: Vec<Rect>,
    pub bounding_box: Rect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<HighlightStyle>,
    /// Highlight identity, present once the engine has claimed the annotation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<HighlightIdentity>,
}

impl Annotation {
    /// Create a highlight annotation covering `rects`
    pub fn highlight(page_index: usize, rects: Vec<Rect>) -> Self {
        let bounding_box = Rect::union_all(&rects).unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
        Self {
            id: Uuid::new_v4().to_string(),
            kind: AnnotationKind::Highlight,
            page_index,
            rects,
            bounding_box,
            style: None,
            custom_data: None,
        }
    }

    pub fn with_identity(mut self, identity: HighlightIdentity) -> Self {
        self.custom_data = Some(identity);
        self
    }

    pub fn with_style(mut self, style: HighlightStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn is_highlight(&self) -> bool {
        self.kind == AnnotationKind::Highlight
    }

    pub fn identity(&self) -> Option<&HighlightIdentity> {
        self.custom_data.as_ref()
    }

    /// Highlight id carried by this annotation, if any
    pub fn highlight_id(&self) -> Option<&str> {
        self.custom_data.as_ref().map(|identity| identity.id.as_str())
    }
}

/// Why annotations are about to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    /// Explicit deletion has started
    DeleteStart,
    /// Explicit deletion is being committed
    DeleteEnd,
    /// Any other cause (moves, property edits, reloads)
    Other,
}

/// Events fired by the surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    /// Annotations were created, by the user or programmatically
    AnnotationsCreated { annotations: Vec<Annotation> },
    /// Annotations are about to be removed or changed
    AnnotationsWillChange {
        reason: ChangeReason,
        annotations: Vec<Annotation>,
    },
    /// The current page changed
    CurrentPageChanged { page_index: usize },
}

/// A loaded document view that draws and manages annotations
#[async_trait]
pub trait AnnotationSurface: PageGeometry + Send + Sync {
    /// Annotations currently present on a page
    async fn annotations(&self, page_index: usize) -> Result<Vec<Annotation>, SurfaceError>;

    /// Add an annotation; fires a creation event
    async fn create(&self, annotation: Annotation) -> Result<Annotation, SurfaceError>;

    /// Replace an existing annotation, matched by surface id
    async fn update(&self, annotation: Annotation) -> Result<Annotation, SurfaceError>;

    /// Remove annotations; fires a will-change event with `DeleteEnd`
    async fn delete(&self, annotations: &[Annotation]) -> Result<(), SurfaceError>;

    /// Text covered by a markup annotation
    async fn markup_text(&self, annotation: &Annotation) -> Result<String, SurfaceError>;

    /// Serialize an annotation into a storable patch
    fn to_patch(&self, annotation: &Annotation) -> Result<HighlightPatch, SurfaceError>;

    /// Rebuild an annotation from a stored patch
    fn from_patch(&self, patch: &HighlightPatch) -> Result<Annotation, SurfaceError>;

    /// Tear down the view; later operations fail with `Unloaded`
    async fn unload(&self);
}

/// Opens a surface on a document
#[async_trait]
pub trait SurfaceLoader: Send + Sync {
    type Surface: AnnotationSurface + 'static;

    async fn load(
        &self,
        document_url: &str,
        initial_page_index: usize,
    ) -> Result<Self::Surface, SurfaceError>;
}
