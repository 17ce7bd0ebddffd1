//! Error types for mozaika.

use thiserror::Error;

/// Result type alias using mozaika's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mozaika operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Message queue operation failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// The model provider rejected the request for capacity reasons.
    ///
    /// Backends classify HTTP 429 / quota-exhaustion responses into this
    /// variant at the provider boundary so callers can distinguish capacity
    /// failures from format failures without inspecting message text.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Search operation failed
    #[error("Search error: {0}")]
    Search(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error represents a capacity failure at a model provider.
    ///
    /// Rate-limited calls are the one class of failure the ingestion pipeline
    /// must not swallow: the message stays on the queue for redelivery.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
