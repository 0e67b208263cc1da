//! Highlight module
//!
//! - Highlight records, the identity metadata attached to surface
//!   annotations, and the opaque geometry patch
//! - The in-process highlight cache shared with list views

mod cache;
mod types;

pub use cache::HighlightCache;
pub use types::{normalize_quote, Article, Highlight, HighlightIdentity, HighlightPatch, SHORT_ID_LEN};
