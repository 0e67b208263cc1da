//! Error types for the highlight sync engine

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Top-level error returned by session operations
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The document view was torn down while the operation was in flight
    #[error("Document view closed")]
    ViewClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Remote store errors
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

/// Annotation surface errors
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Annotation not found: {0}")]
    AnnotationNotFound(String),

    #[error("Page index {index} out of range (pages: {count})")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Invalid highlight patch: {0}")]
    InvalidPatch(String),

    #[error("Surface has been unloaded")]
    Unloaded,
}

/// Highlight cache errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    #[error("Highlight already cached: {0}")]
    DuplicateId(String),

    #[error("Highlight not found: {0}")]
    NotFound(String),
}

impl HighlightError {
    /// Whether the failure came from the remote store.
    ///
    /// Remote failures are recoverable and leave the local view intact.
    pub fn is_remote(&self) -> bool {
        matches!(self, HighlightError::Sync(_))
    }
}
