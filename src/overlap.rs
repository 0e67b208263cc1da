//! Overlap detection between a drawn region and existing highlights

use crate::error::SurfaceError;
use crate::geometry::{rect_sets_overlap, Rect};
use crate::surface::{Annotation, AnnotationSurface};

/// Existing highlights on `page_index` that intersect `candidate`.
///
/// Only highlight annotations that carry a highlight identity are
/// considered. The result is unordered.
pub async fn find_overlapping<S>(
    surface: &S,
    page_index: usize,
    candidate: &[Rect],
) -> Result<Vec<Annotation>, SurfaceError>
where
    S: AnnotationSurface + ?Sized,
{
    let existing = surface.annotations(page_index).await?;
    Ok(existing
        .into_iter()
        .filter(|annotation| annotation.is_highlight() && annotation.identity().is_some())
        .filter(|annotation| rect_sets_overlap(&annotation.rects, candidate))
        .collect())
}
