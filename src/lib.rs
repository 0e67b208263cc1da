//! Highlight Sync
//!
//! Keeps the visual highlights of a paginated document view in step with a
//! remote highlight store and an in-process highlight cache.
//!
//! # Modules
//!
//! - `session`: one open document view; event handling and the event loop
//! - `merge`: reconciliation of drawn regions into created or merged highlights
//! - `surface`: the annotation surface interface and an in-memory surface
//! - `sync`: remote store client and request payloads
//! - `highlights`: highlight records and the highlight cache
//! - `progress`: monotonic reading progress
//! - `deletion`: deletion requests from views without a surface
//! - `geometry`, `position`, `overlap`: page geometry helpers

pub mod config;
pub mod deletion;
pub mod error;
pub mod geometry;
pub mod highlights;
pub mod merge;
pub mod overlap;
pub mod position;
pub mod progress;
pub mod session;
pub mod surface;
pub mod sync;

pub use config::Config;
pub use deletion::{deletion_channel, DeletionListener, DeletionPublisher};
pub use error::{HighlightError, Result};
pub use merge::Reconciled;
pub use session::{EventOutcome, HighlightSession, ViewHandle};
