#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Notify};

use highlight_sync::config::Config;
use highlight_sync::error::{HighlightError, SyncError};
use highlight_sync::geometry::Rect;
use highlight_sync::highlights::{Article, Highlight, HighlightPatch};
use highlight_sync::session::{EventOutcome, HighlightSession};
use highlight_sync::surface::{Annotation, MemoryDocument, MemorySurface, SurfaceEvent};
use highlight_sync::sync::{
    CreateHighlightInput, MergeHighlightInput, ReadingProgressInput, SyncClient,
    UpdateHighlightInput,
};

/// A remote call as the mock store received it
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(CreateHighlightInput),
    Merge(MergeHighlightInput),
    Delete(String),
    Update(String, UpdateHighlightInput),
    Progress(ReadingProgressInput),
}

/// Sync client that records every call and fails on demand
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    pub fail_creates: AtomicBool,
    pub fail_merges: AtomicBool,
    pub fail_deletes: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl RecordingClient {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> Vec<CreateHighlightInput> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(input) => Some(input),
                _ => None,
            })
            .collect()
    }

    pub fn merges(&self) -> Vec<MergeHighlightInput> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Merge(input) => Some(input),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Progress(input) => Some(input.reading_progress_percent),
                _ => None,
            })
            .collect()
    }

    /// Make create, merge and delete calls wait until the returned gate is
    /// notified once per call
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    async fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn check(flag: &AtomicBool) -> Result<(), SyncError> {
        if flag.load(Ordering::SeqCst) {
            Err(SyncError::Unavailable("offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SyncClient for RecordingClient {
    async fn create_highlight(&self, input: CreateHighlightInput) -> Result<Highlight, SyncError> {
        self.record(Call::Create(input.clone())).await;
        Self::check(&self.fail_creates)?;
        Ok(input.to_highlight(Vec::new()))
    }

    async fn merge_highlights(&self, input: MergeHighlightInput) -> Result<Highlight, SyncError> {
        self.record(Call::Merge(input.clone())).await;
        Self::check(&self.fail_merges)?;
        Ok(input.highlight.to_highlight(Vec::new()))
    }

    async fn delete_highlight(&self, highlight_id: &str) -> Result<(), SyncError> {
        self.record(Call::Delete(highlight_id.to_string())).await;
        Self::check(&self.fail_deletes)
    }

    async fn update_highlight(
        &self,
        highlight_id: &str,
        input: UpdateHighlightInput,
    ) -> Result<Highlight, SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Update(highlight_id.to_string(), input.clone()));
        let now = Utc::now();
        Ok(Highlight {
            id: highlight_id.to_string(),
            short_id: String::new(),
            article_id: "article-1".to_string(),
            quote: String::new(),
            prefix: String::new(),
            suffix: String::new(),
            patch: HighlightPatch::new("{}"),
            position_percent: 0.0,
            position_anchor_index: 0,
            annotation: input.annotation,
            merged_from_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_reading_progress(&self, input: ReadingProgressInput) -> Result<(), SyncError> {
        tokio::task::yield_now().await;
        self.calls.lock().unwrap().push(Call::Progress(input));
        Ok(())
    }
}

/// A stored highlight covering `rect` on `page_index`
pub fn stored_highlight(id: &str, page_index: usize, rect: Rect) -> Highlight {
    let annotation = Annotation::highlight(page_index, vec![rect]);
    let now = Utc::now();
    Highlight {
        id: id.to_string(),
        short_id: format!("{}-short", id),
        article_id: "article-1".to_string(),
        quote: format!("quote {}", id),
        prefix: String::new(),
        suffix: String::new(),
        patch: HighlightPatch::new(serde_json::to_string(&annotation).unwrap()),
        position_percent: 0.0,
        position_anchor_index: page_index,
        annotation: None,
        merged_from_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn article(highlights: Vec<Highlight>) -> Article {
    Article {
        id: "article-1".to_string(),
        slug: "my-article".to_string(),
        title: "My Article".to_string(),
        url: "memory://my-article".to_string(),
        reading_progress_percent: 0.0,
        reading_progress_anchor_index: 0,
        highlights,
    }
}

pub struct Harness {
    pub session: HighlightSession<MemorySurface, RecordingClient>,
    pub client: Arc<RecordingClient>,
    pub surface: MemorySurface,
    pub events: mpsc::UnboundedReceiver<SurfaceEvent>,
}

impl Harness {
    pub async fn open(heights: Vec<Option<f64>>, highlights: Vec<Highlight>) -> Self {
        Self::open_with(heights, article(highlights), Config::default()).await
    }

    pub async fn open_with(heights: Vec<Option<f64>>, article: Article, config: Config) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let document = MemoryDocument::new(heights).with_events(tx);
        let client = Arc::new(RecordingClient::default());
        let session = HighlightSession::open(&document, article, Arc::clone(&client), config)
            .await
            .unwrap();
        let surface = session.surface().clone();
        let mut harness = Self {
            session,
            client,
            surface,
            events,
        };
        // Replay echoes from opening the view
        harness.drain().await;
        harness
    }

    /// Handle every queued surface event
    pub async fn drain(&mut self) -> Vec<Result<EventOutcome, HighlightError>> {
        let mut outcomes = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            outcomes.push(self.session.handle_event(event).await);
        }
        outcomes
    }

    /// Surface annotations carrying `highlight_id`
    pub async fn annotations_for(&self, highlight_id: &str) -> Vec<Annotation> {
        self.surface
            .all_annotations()
            .await
            .into_iter()
            .filter(|a| a.highlight_id() == Some(highlight_id))
            .collect()
    }
}
