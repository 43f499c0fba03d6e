//! Content generation for Spindle.
//!
//! This crate provides:
//! - Provider selection for a job ([`resolve_setting`])
//! - An OpenAI-compatible chat client behind the [`TextGenerator`] seam
//! - Prompt builders for threads and comment replies
//! - Parsing of generated and templated post lists

mod client;
mod content;
mod error;
mod prompt;
mod provider;
mod resolve;

pub use client::{ChatClient, GenerationRequest, TextGenerator};
pub use content::{GeneratedContent, clean_comment, parse_template_posts, truncate_chars};
pub use error::LlmError;
pub use prompt::{
    CommentStyle, DEFAULT_LANGUAGE, DEFAULT_TOPIC, MAX_COMMENT_CHARS, comment_prompt,
    thread_prompt,
};
pub use provider::{Provider, ProviderConfig};
pub use resolve::{ProviderResolution, resolve_setting};
