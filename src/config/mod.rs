// ABOUTME: Client configuration loaded from ~/.elisa-chat/config.toml
// Missing or malformed files fall back to defaults; CLI flags override individual values

use crate::i18n::Language;
use crate::session::StoreSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin serving the discovery endpoint
    pub base_url: String,
    /// Path returning the websocket URL as plain text
    pub discovery_path: String,
    /// Directory for the persisted message log, `~/.elisa-chat/storage` if unset
    pub storage_dir: Option<PathBuf>,
    pub language: Language,
    /// Hidden first message that makes the agent greet the user
    pub greeting: String,
    pub reconnect_delay_ms: u64,
    pub discovery_retry_delay_ms: u64,
    pub auto_connect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            discovery_path: "/api.url".to_string(),
            storage_dir: None,
            language: Language::En,
            greeting: "Hi!".to_string(),
            reconnect_delay_ms: 5_000,
            discovery_retry_delay_ms: 10_000,
            auto_connect: true,
        }
    }
}

impl ClientConfig {
    /// `~/.elisa-chat/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".elisa-chat").join("config.toml"))
    }

    /// Load configuration from `path`, falling back to defaults when the file
    /// is missing or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config found at {}, using defaults", path.display());
                return Self::default();
            }
            Err(err) => {
                tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
                return Self::default();
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            greeting: self.greeting.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            discovery_retry_delay: Duration::from_millis(self.discovery_retry_delay_ms),
        }
    }
}
