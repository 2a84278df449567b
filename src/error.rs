//! Error types for the monitor client

use thiserror::Error;

/// Monitor client error
#[derive(Debug, Error)]
pub enum MonitorError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Resource not found (unknown spot, zone, ...)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Event stream connection failed or dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for MonitorError {
    fn from(e: toml::de::Error) -> Self {
        MonitorError::Config(e.to_string())
    }
}

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;
