//! Page geometry helpers
//!
//! Rectangles use a top-left origin in page units, matching the coordinate
//! space the annotation surface reports.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle on a single page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Zero-area, negative or non-finite rectangles
    pub fn is_degenerate(&self) -> bool {
        !(self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    /// Whether the two rectangles share a region of non-zero area.
    ///
    /// Touching edges do not count, and degenerate rectangles never overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        if self.is_degenerate() || other.is_degenerate() {
            return false;
        }
        self.left < other.right()
            && other.left < self.right()
            && self.top < other.bottom()
            && other.top < self.bottom()
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }

    /// Bounding box of every rectangle, or `None` for an empty input
    pub fn union_all<'a, I>(rects: I) -> Option<Rect>
    where
        I: IntoIterator<Item = &'a Rect>,
    {
        rects
            .into_iter()
            .fold(None, |acc: Option<Rect>, r| match acc {
                Some(bbox) => Some(bbox.union(r)),
                None => Some(*r),
            })
    }
}

/// Whether any rectangle of `a` overlaps any rectangle of `b`
pub fn rect_sets_overlap(a: &[Rect], b: &[Rect]) -> bool {
    a.iter().any(|ra| b.iter().any(|rb| ra.overlaps(rb)))
}

/// Per-page size information of a loaded document
pub trait PageGeometry {
    fn total_page_count(&self) -> usize;

    /// Height of a page, or `None` when the surface cannot report it
    fn page_height(&self, page_index: usize) -> Option<f64>;

    /// Page height with unknown or invalid values counted as zero
    fn height_or_zero(&self, page_index: usize) -> f64 {
        match self.page_height(page_index) {
            Some(h) if h.is_finite() && h > 0.0 => h,
            _ => 0.0,
        }
    }
}

/// Page heights held in memory; `None` entries are unknown
impl PageGeometry for [Option<f64>] {
    fn total_page_count(&self) -> usize {
        self.len()
    }

    fn page_height(&self, page_index: usize) -> Option<f64> {
        self.get(page_index).copied().flatten()
    }
}
