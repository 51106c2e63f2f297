//! Error types for the chat-stream engine

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the engine
///
/// Only errors that escape the per-line isolation boundary end up here. A
/// malformed `data:` payload is a [`LineParseError`] and a dangling partial
/// character at end-of-stream is a [`DecodeAnomaly`]; both are logged and
/// absorbed by the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error (connect failure, body read failure, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Non-2xx response from the completion endpoint
    #[error("API error: {0}")]
    Api(String),

    /// Streaming error
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The caller's cancellation token fired
    #[error("Stream request aborted")]
    Cancelled,
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// True when this error represents user cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// A single `data:` payload that could not be parsed.
///
/// Never escalates: the line is logged and skipped.
#[derive(Error, Debug)]
#[error("malformed SSE payload {payload:?}: {source}")]
pub struct LineParseError {
    /// The payload text after the `data: ` prefix
    pub payload: String,
    #[source]
    pub source: serde_json::Error,
}

/// Undecodable bytes left over when the byte stream ended.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{pending_bytes} incomplete UTF-8 byte(s) left at end of stream")]
pub struct DecodeAnomaly {
    pub pending_bytes: usize,
}
