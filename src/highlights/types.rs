//! Highlight records and the identity attached to surface annotations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the shareable short id
pub const SHORT_ID_LEN: usize = 8;

/// A persisted highlight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    /// Unique identifier (UUID), generated client side
    pub id: String,
    /// Short shareable identifier
    pub short_id: String,
    /// The article this highlight belongs to
    pub article_id: String,
    /// Normalized highlighted text
    pub quote: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    /// Serialized surface geometry, replayed on load
    pub patch: HighlightPatch,
    /// Vertical position within the document, 0-100
    #[serde(rename = "highlightPositionPercent", default)]
    pub position_percent: f64,
    /// Page the highlight starts on
    #[serde(rename = "highlightPositionAnchorIndex", default)]
    pub position_anchor_index: usize,
    /// Free-text note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    /// Ids this highlight replaced when it was produced by a merge
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_from_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Opaque serialized annotation geometry.
///
/// Produced and consumed only by the annotation surface; the engine stores
/// and replays it without looking inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightPatch(String);

impl HighlightPatch {
    pub fn new(serialized: impl Into<String>) -> Self {
        Self(serialized.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Highlight metadata carried by a surface annotation.
///
/// An annotation that carries an identity is already known to the engine;
/// creation events for it are echoes of programmatic writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightIdentity {
    pub id: String,
    pub short_id: String,
    pub article_id: String,
    pub quote: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl HighlightIdentity {
    /// Generate a fresh identity for a newly drawn region
    pub fn generate(article_id: &str, quote: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            short_id: generate_short_id(),
            article_id: article_id.to_string(),
            quote,
            prefix: String::new(),
            suffix: String::new(),
            annotation: None,
        }
    }
}

impl Highlight {
    /// Identity metadata to attach to the surface annotation of this highlight
    pub fn identity(&self) -> HighlightIdentity {
        HighlightIdentity {
            id: self.id.clone(),
            short_id: self.short_id.clone(),
            article_id: self.article_id.clone(),
            quote: self.quote.clone(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            annotation: self.annotation.clone(),
        }
    }

    /// Whether this record replaced other highlights
    pub fn is_merge_result(&self) -> bool {
        !self.merged_from_ids.is_empty()
    }
}

/// The document a view is opened on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub slug: String,
    pub title: String,
    /// Location of the document the surface loads
    pub url: String,
    #[serde(default)]
    pub reading_progress_percent: f64,
    #[serde(default)]
    pub reading_progress_anchor_index: usize,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
}

/// Collapse line breaks to single spaces and trim
pub fn normalize_quote(raw: &str) -> String {
    raw.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

fn generate_short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(SHORT_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_highlight() -> Highlight {
        let now = Utc::now();
        Highlight {
            id: "hl-1".to_string(),
            short_id: "abcd1234".to_string(),
            article_id: "article-1".to_string(),
            quote: "hello world".to_string(),
            prefix: String::new(),
            suffix: String::new(),
            patch: HighlightPatch::new(r#"{"pageIndex":0}"#),
            position_percent: 12.5,
            position_anchor_index: 0,
            annotation: Some("note".to_string()),
            merged_from_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_normalize_quote() {
        assert_eq!(normalize_quote("  one\r\ntwo\nthree\rfour  "), "one two three four");
        assert_eq!(normalize_quote("\n\n"), "");
    }

    #[test]
    fn test_generated_identity() {
        let a = HighlightIdentity::generate("article-1", "text".to_string());
        let b = HighlightIdentity::generate("article-1", "text".to_string());
        assert_ne!(a.id, b.id);
        assert_eq!(a.short_id.len(), SHORT_ID_LEN);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_identity_carries_note() {
        let highlight = sample_highlight();
        let identity = highlight.identity();
        assert_eq!(identity.id, "hl-1");
        assert_eq!(identity.annotation.as_deref(), Some("note"));
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(sample_highlight()).unwrap();
        assert_eq!(json["shortId"], "abcd1234");
        assert_eq!(json["articleId"], "article-1");
        assert_eq!(json["highlightPositionPercent"], 12.5);
        assert_eq!(json["highlightPositionAnchorIndex"], 0);
        // Patch stays an opaque string on the wire
        assert_eq!(json["patch"], r#"{"pageIndex":0}"#);
        assert!(json.get("mergedFromIds").is_none());
    }
}
