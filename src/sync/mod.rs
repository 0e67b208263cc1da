//! Remote synchronization
//!
//! - `SyncClient`: the operations the engine needs from the remote store
//! - `HttpSyncClient`: JSON-over-HTTP implementation
//! - Request payloads and the drift ledger entries for unconfirmed writes

mod client;
mod http;
mod types;

pub use client::SyncClient;
pub use http::HttpSyncClient;
pub use types::{
    CreateHighlightInput, MergeHighlightInput, PendingOperation, PendingWrite,
    ReadingProgressInput, UpdateHighlightInput,
};
