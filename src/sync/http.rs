//! HTTP client for the remote highlight store
//!
//! Endpoints (relative to the configured base URL):
//!
//! - `POST /highlights` - create
//! - `POST /highlights/merge` - merge
//! - `PATCH /highlights/{id}` - update note
//! - `DELETE /highlights/{id}` - delete
//! - `PUT /progress/{article_id}` - reading progress

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use super::client::SyncClient;
use super::types::{
    CreateHighlightInput, MergeHighlightInput, ReadingProgressInput, UpdateHighlightInput,
};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::highlights::Highlight;

/// JSON-over-HTTP [`SyncClient`]
#[derive(Clone)]
pub struct HttpSyncClient {
    client: Client,
    base_url: String,
}

impl HttpSyncClient {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn highlight_url(&self, highlight_id: &str) -> String {
        format!(
            "{}/highlights/{}",
            self.base_url,
            urlencoding::encode(highlight_id)
        )
    }
}

/// Map non-success statuses to [`SyncError::Rejected`]
async fn check_status(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
    Err(SyncError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SyncError> {
    let body = check_status(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl SyncClient for HttpSyncClient {
    async fn create_highlight(&self, input: CreateHighlightInput) -> Result<Highlight, SyncError> {
        tracing::debug!(highlight_id = %input.id, "POST highlight");
        let response = self
            .client
            .post(format!("{}/highlights", self.base_url))
            .json(&input)
            .send()
            .await?;
        decode(response).await
    }

    async fn merge_highlights(&self, input: MergeHighlightInput) -> Result<Highlight, SyncError> {
        tracing::debug!(
            highlight_id = %input.highlight.id,
            merged = input.overlap_highlight_id_list.len(),
            "POST highlight merge"
        );
        let response = self
            .client
            .post(format!("{}/highlights/merge", self.base_url))
            .json(&input)
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_highlight(&self, highlight_id: &str) -> Result<(), SyncError> {
        tracing::debug!(highlight_id = %highlight_id, "DELETE highlight");
        let response = self
            .client
            .delete(self.highlight_url(highlight_id))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn update_highlight(
        &self,
        highlight_id: &str,
        input: UpdateHighlightInput,
    ) -> Result<Highlight, SyncError> {
        let response = self
            .client
            .patch(self.highlight_url(highlight_id))
            .json(&input)
            .send()
            .await?;
        decode(response).await
    }

    async fn update_reading_progress(&self, input: ReadingProgressInput) -> Result<(), SyncError> {
        let response = self
            .client
            .put(format!(
                "{}/progress/{}",
                self.base_url,
                urlencoding::encode(&input.id)
            ))
            .json(&input)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
