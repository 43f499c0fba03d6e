//! Threads Graph API client for Spindle.
//!
//! This crate provides:
//! - **Client**: container creation, publishing and keyword search over HTTP
//! - **Chain publisher**: publishes an ordered list of posts as one reply chain,
//!   tolerating failures in the middle of the chain

mod chain;
mod client;
mod error;
mod types;

pub use chain::{ChainPublisher, DEFAULT_POST_DELAY};
pub use client::{DEFAULT_API_URL, ThreadsApi, ThreadsClient};
pub use error::ThreadsError;
pub use types::{Credential, PublishOutcome, SearchResult};
