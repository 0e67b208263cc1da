//! Configuration management for the highlight sync engine

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::HighlightError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub sync: SyncConfig,
    pub share: ShareConfig,
    pub style: HighlightStyle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the remote highlight store
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    pub web_base_url: String,
    pub viewer_username: String,
}

/// Visual style applied to highlights the engine creates on the surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    /// CSS hex color
    pub color: String,
    pub opacity: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: "#ffd234".to_string(),
            opacity: 0.45,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sync: SyncConfig {
                base_url: "http://localhost:4000/api".to_string(),
                timeout_secs: 30,
            },
            share: ShareConfig {
                web_base_url: "https://omnivore.app".to_string(),
                viewer_username: String::new(),
            },
            style: HighlightStyle::default(),
        }
    }
}

impl SyncConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, HighlightError> {
        let defaults = Config::default();

        let opacity = match env::var("HIGHLIGHT_OPACITY") {
            Ok(raw) => raw
                .parse::<f32>()
                .ok()
                .filter(|o| (0.0..=1.0).contains(o))
                .ok_or_else(|| {
                    HighlightError::Config(format!("HIGHLIGHT_OPACITY out of range: {}", raw))
                })?,
            Err(_) => defaults.style.opacity,
        };

        Ok(Config {
            sync: SyncConfig {
                base_url: env::var("SYNC_BASE_URL")
                    .map_err(|_| HighlightError::Config("SYNC_BASE_URL is not set".to_string()))?
                    .trim_end_matches('/')
                    .to_string(),
                timeout_secs: env::var("SYNC_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.sync.timeout_secs),
            },
            share: ShareConfig {
                web_base_url: env::var("WEB_BASE_URL")
                    .unwrap_or(defaults.share.web_base_url)
                    .trim_end_matches('/')
                    .to_string(),
                viewer_username: env::var("VIEWER_USERNAME").unwrap_or_default(),
            },
            style: HighlightStyle {
                color: env::var("HIGHLIGHT_COLOR").unwrap_or(defaults.style.color),
                opacity,
            },
        })
    }
}
