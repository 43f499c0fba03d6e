//! Error types for content generation.

use thiserror::Error;

/// Errors that can occur while generating text.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider cannot be used as configured.
    #[error("invalid provider configuration: {0}")]
    Config(String),

    /// Provider returned an error response.
    #[error("provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Provider answered without any content.
    #[error("provider returned no content")]
    EmptyResponse,
}
