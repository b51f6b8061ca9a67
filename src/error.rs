//! Error types for Parley gateway

use thiserror::Error;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parley gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Generation service error (non-success status, malformed reply)
    #[error("generation error: {0}")]
    Generate(String),

    /// Speech chat completion error
    #[error("audio chat error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("transcription error: {0}")]
    Transcribe(String),

    /// Page template error
    #[error("template error: {0}")]
    Template(String),

    /// File watcher error
    #[error("watch error: {0}")]
    Watch(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Base64 decoding error
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Self::Watch(e.to_string())
    }
}
