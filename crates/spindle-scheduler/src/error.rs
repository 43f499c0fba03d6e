//! Error types for the engines.

use spindle_llm::LlmError;
use spindle_store::{JobStatus, StoreError};
use thiserror::Error;

/// Errors that end a job or campaign run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Content generation failed.
    #[error("generation failed: {0}")]
    Llm(#[from] LlmError),

    /// The target account does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(i64),

    /// The account's access token is past its expiry.
    #[error("access token for @{0} has expired; reconnect required")]
    TokenExpired(String),

    /// No usable LLM setting for the owner.
    #[error("no LLM provider configured for user {0}")]
    NoProvider(String),

    /// Generation produced zero posts.
    #[error("no content to publish")]
    NoContent,

    /// An operator action does not apply to the job's current status.
    #[error("job {id} is {status} and cannot be {action}")]
    JobState {
        id: i64,
        status: JobStatus,
        action: &'static str,
    },

    /// The item cannot run as configured.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
