//! Error types for the Threads client.

use thiserror::Error;

/// Errors that can occur when talking to the Threads API.
#[derive(Debug, Error)]
pub enum ThreadsError {
    /// HTTP request failed (connect error, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered with an error object.
    #[error("API error: {message}")]
    Api { message: String },

    /// Rate limited.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited {
        /// Seconds to wait before retrying (from Retry-After header, optional).
        retry_after_secs: Option<u64>,
    },

    /// Response did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ThreadsError {
    /// Whether a retry of the same idempotent request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ThreadsError::Http(e) => e.is_timeout() || e.is_connect(),
            ThreadsError::InvalidResponse(msg) => msg.starts_with("request failed (5"),
            _ => false,
        }
    }
}
