//! Monitor configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then environment
//! variables, then command-line overrides applied by the binary.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MonitorError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Facility HTTP API (zones, occupancy, navigation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the API version prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Spot event stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// WebSocket URL of the spot update channel
    #[serde(default = "default_ws_url")]
    pub url: String,

    /// Delay before each reconnect attempt in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Periodic snapshot pull interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

// Defaults
fn default_base_url() -> String { "http://localhost:8000/api/v1".to_string() }
fn default_request_timeout() -> u64 { 30 }
fn default_ws_url() -> String { "ws://localhost:8000/ws/spots".to_string() }
fn default_reconnect_delay() -> u64 { 3000 }
fn default_poll_interval() -> u64 { 10 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl MonitorConfig {
    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `CLOUDPARK_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CLOUDPARK_API_URL") {
            self.api.base_url = url;
        }
        if let Some(token) = lookup("CLOUDPARK_TOKEN") {
            self.api.token = Some(token);
        }
        if let Some(url) = lookup("CLOUDPARK_WS_URL") {
            self.events.url = url;
        }
        if let Some(ms) = lookup("CLOUDPARK_RECONNECT_DELAY_MS").and_then(|s| s.parse().ok()) {
            self.events.reconnect_delay_ms = ms;
        }
        if let Some(secs) = lookup("CLOUDPARK_POLL_INTERVAL_SECS").and_then(|s| s.parse().ok()) {
            self.sync.poll_interval_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            return Err(MonitorError::Config("api.base_url must not be empty".into()));
        }
        if !self.events.url.starts_with("ws://") && !self.events.url.starts_with("wss://") {
            return Err(MonitorError::Config(format!(
                "events.url must be a ws:// or wss:// URL, got {}",
                self.events.url
            )));
        }
        if self.events.reconnect_delay_ms == 0 {
            return Err(MonitorError::Config("events.reconnect_delay_ms must be > 0".into()));
        }
        if self.sync.poll_interval_secs == 0 {
            return Err(MonitorError::Config("sync.poll_interval_secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.events.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}
