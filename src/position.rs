//! Document-relative highlight positions
//!
//! A highlight's position is the height of all pages above it plus its
//! offset inside its own page, normalized by the height of the whole
//! document. The value is independent of the current zoom level, so it is
//! usable for notebook ordering and scroll-to-highlight.

use crate::geometry::PageGeometry;

/// Normalized position in `[0, 1]` of a point `top` units into `page_index`.
///
/// Pages with unknown height contribute zero. A document whose known heights
/// sum to zero yields `0.0`.
pub fn position_fraction<G>(geometry: &G, page_index: usize, top: f64) -> f64
where
    G: PageGeometry + ?Sized,
{
    let page_count = geometry.total_page_count();
    let total: f64 = (0..page_count).map(|idx| geometry.height_or_zero(idx)).sum();
    if total <= 0.0 {
        return 0.0;
    }

    let before: f64 = (0..page_index.min(page_count))
        .map(|idx| geometry.height_or_zero(idx))
        .sum();
    let offset = if top.is_finite() { top.max(0.0) } else { 0.0 };

    ((before + offset) / total).clamp(0.0, 1.0)
}

/// Position scaled to a percentage, as persisted on a highlight
pub fn position_percent<G>(geometry: &G, page_index: usize, top: f64) -> f64
where
    G: PageGeometry + ?Sized,
{
    position_fraction(geometry, page_index, top) * 100.0
}
