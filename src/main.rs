//! Highlight Replay
//!
//! Drives a highlight session over an in-memory document from a JSON script
//! and prints the resulting highlight cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use serde::Deserialize;
use tokio::sync::{mpsc, RwLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use highlight_sync::error::SyncError;
use highlight_sync::geometry::Rect;
use highlight_sync::highlights::{Article, Highlight};
use highlight_sync::session::HighlightSession;
use highlight_sync::surface::{MemoryDocument, MemorySurface, SurfaceEvent, TextSpan};
use highlight_sync::sync::{
    CreateHighlightInput, HttpSyncClient, MergeHighlightInput, ReadingProgressInput, SyncClient,
    UpdateHighlightInput,
};
use highlight_sync::Config;

/// Replay reader actions against a highlight session.
#[derive(Debug, Parser)]
#[command(name = "highlight-replay", about, version)]
struct Cli {
    /// Path to the JSON replay script
    #[arg(long, value_name = "FILE")]
    script: PathBuf,

    /// Log remote writes instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Script {
    /// Page heights; `null` for pages whose height is not known yet
    page_heights: Vec<Option<f64>>,
    #[serde(default)]
    text: Vec<TextSpan>,
    article: Article,
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum Action {
    /// Draw a highlight region
    #[serde(rename_all = "camelCase")]
    Draw { page_index: usize, rects: Vec<Rect> },
    /// Remove a highlight through the surface
    #[serde(rename_all = "camelCase")]
    Remove { highlight_id: String },
    /// Scroll to a page
    #[serde(rename_all = "camelCase")]
    Navigate { page_index: usize },
    /// Delete a highlight from the notebook list
    #[serde(rename_all = "camelCase")]
    DeleteById { highlight_id: String },
    /// Edit the note of a highlight
    #[serde(rename_all = "camelCase")]
    EditNote {
        highlight_id: String,
        note: Option<String>,
    },
    /// Re-issue unconfirmed writes
    RetryPending,
}

/// Client that logs remote writes and answers as the store would
struct LoggingClient {
    highlights: RwLock<HashMap<String, Highlight>>,
}

impl LoggingClient {
    fn new(existing: &[Highlight]) -> Self {
        let highlights = existing
            .iter()
            .map(|h| (h.id.clone(), h.clone()))
            .collect();
        Self {
            highlights: RwLock::new(highlights),
        }
    }
}

#[async_trait]
impl SyncClient for LoggingClient {
    async fn create_highlight(&self, input: CreateHighlightInput) -> Result<Highlight, SyncError> {
        tracing::info!(highlight_id = %input.id, quote = %input.quote, "[dry-run] create");
        let highlight = input.to_highlight(Vec::new());
        self.highlights
            .write()
            .await
            .insert(highlight.id.clone(), highlight.clone());
        Ok(highlight)
    }

    async fn merge_highlights(&self, input: MergeHighlightInput) -> Result<Highlight, SyncError> {
        tracing::info!(
            highlight_id = %input.highlight.id,
            subsumed = ?input.overlap_highlight_id_list,
            "[dry-run] merge"
        );
        let highlight = input
            .highlight
            .to_highlight(input.overlap_highlight_id_list.clone());
        let mut highlights = self.highlights.write().await;
        for id in &input.overlap_highlight_id_list {
            highlights.remove(id);
        }
        highlights.insert(highlight.id.clone(), highlight.clone());
        Ok(highlight)
    }

    async fn delete_highlight(&self, highlight_id: &str) -> Result<(), SyncError> {
        tracing::info!(highlight_id = %highlight_id, "[dry-run] delete");
        self.highlights.write().await.remove(highlight_id);
        Ok(())
    }

    async fn update_highlight(
        &self,
        highlight_id: &str,
        input: UpdateHighlightInput,
    ) -> Result<Highlight, SyncError> {
        tracing::info!(highlight_id = %highlight_id, "[dry-run] update note");
        let mut highlights = self.highlights.write().await;
        let highlight = highlights.get_mut(highlight_id).ok_or_else(|| SyncError::Rejected {
            status: 404,
            message: format!("Highlight not found: {}", highlight_id),
        })?;
        highlight.annotation = input.annotation;
        highlight.updated_at = chrono::Utc::now();
        Ok(highlight.clone())
    }

    async fn update_reading_progress(&self, input: ReadingProgressInput) -> Result<(), SyncError> {
        tracing::info!(
            article_id = %input.id,
            percent = input.reading_progress_percent,
            "[dry-run] reading progress"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "highlight_sync=debug,highlight_replay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let raw = tokio::fs::read_to_string(&cli.script)
        .await
        .with_context(|| format!("Failed to read script {}", cli.script.display()))?;
    let script: Script = serde_json::from_str(&raw).context("Failed to parse replay script")?;

    let highlights = if cli.dry_run {
        let config = Config::from_env().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from env: {}, using defaults", e);
            Config::default()
        });
        let client = Arc::new(LoggingClient::new(&script.article.highlights));
        replay(script, client, config).await?
    } else {
        let config = Config::from_env()?;
        tracing::info!("Remote store: {}", config.sync.base_url);
        let client = Arc::new(HttpSyncClient::new(&config.sync)?);
        replay(script, client, config).await?
    };

    println!("{}", serde_json::to_string_pretty(&highlights)?);
    Ok(())
}

async fn replay<C>(script: Script, client: Arc<C>, config: Config) -> anyhow::Result<Vec<Highlight>>
where
    C: SyncClient + 'static,
{
    let (tx, mut events) = mpsc::unbounded_channel();
    let document = MemoryDocument::new(script.page_heights)
        .with_text(script.text)
        .with_events(tx);

    let mut session = HighlightSession::open(&document, script.article, client, config).await?;
    drain(&mut session, &mut events).await;

    for action in script.actions {
        tracing::debug!(?action, "Replaying action");
        let surface = session.surface().clone();
        let result: anyhow::Result<()> = match action {
            Action::Draw { page_index, rects } => surface
                .draw(page_index, rects)
                .await
                .map(|_| ())
                .map_err(Into::into),
            Action::Remove { highlight_id } => remove(&surface, &highlight_id).await,
            Action::Navigate { page_index } => surface.navigate(page_index).await.map_err(Into::into),
            Action::DeleteById { highlight_id } => session
                .handle_deletion_request(&highlight_id)
                .await
                .map(|_| ())
                .map_err(Into::into),
            Action::EditNote { highlight_id, note } => session
                .update_note(&highlight_id, note)
                .await
                .map(|_| ())
                .map_err(Into::into),
            Action::RetryPending => session
                .retry_pending()
                .await
                .map(|confirmed| tracing::info!(confirmed, "Retried pending writes"))
                .map_err(Into::into),
        };
        if let Err(e) = result {
            tracing::error!("Action failed: {:#}", e);
        }
        drain(&mut session, &mut events).await;
    }

    for write in session.pending_drift() {
        tracing::warn!(
            highlight_id = %write.operation.highlight_id(),
            error = %write.error,
            "Write not confirmed by the remote store"
        );
    }

    let highlights = session.cache().list_by_position().await;
    session.close().await;
    Ok(highlights)
}

/// Remove every annotation carrying `highlight_id` through the surface UI
async fn remove(surface: &MemorySurface, highlight_id: &str) -> anyhow::Result<()> {
    let targets: Vec<String> = surface
        .all_annotations()
        .await
        .into_iter()
        .filter(|a| a.highlight_id() == Some(highlight_id))
        .map(|a| a.id)
        .collect();
    if targets.is_empty() {
        anyhow::bail!("No annotation carries highlight {}", highlight_id);
    }
    for annotation_id in targets {
        surface.remove(&annotation_id).await?;
    }
    Ok(())
}

/// Handle every queued surface event, including echoes of the session's own writes
async fn drain<C>(
    session: &mut HighlightSession<MemorySurface, C>,
    events: &mut mpsc::UnboundedReceiver<SurfaceEvent>,
) where
    C: SyncClient + 'static,
{
    while let Ok(event) = events.try_recv() {
        match session.handle_event(event).await {
            Ok(outcome) => tracing::debug!(?outcome, "Handled surface event"),
            Err(e) => tracing::error!("Failed to handle surface event: {}", e),
        }
    }
    session.flush_progress().await;
}
