//! Prompt builders for threads and comment replies.

use crate::{GenerationRequest, truncate_chars};

/// Topic used when a job names none.
pub const DEFAULT_TOPIC: &str = "engaging content for Threads";

/// Language generated content is written in unless configured otherwise.
pub const DEFAULT_LANGUAGE: &str = "Russian";

/// Hard ceiling on a published comment.
pub const MAX_COMMENT_CHARS: usize = 200;

const THREAD_MAX_TOKENS: u32 = 4096;
const COMMENT_MAX_TOKENS: u32 = 150;
const CANDIDATE_PROMPT_CHARS: usize = 300;

/// Voice of an automated comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommentStyle {
    #[default]
    Helpful,
    Witty,
    Supportive,
    Question,
    Expert,
}

impl CommentStyle {
    /// Look up a style by name; unknown names get [`CommentStyle::Helpful`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "witty" => CommentStyle::Witty,
            "supportive" => CommentStyle::Supportive,
            "question" => CommentStyle::Question,
            "expert" => CommentStyle::Expert,
            _ => CommentStyle::Helpful,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CommentStyle::Helpful => "helpful and knowledgeable, adding value to the discussion",
            CommentStyle::Witty => "witty and ironic, but respectful",
            CommentStyle::Supportive => "supportive and encouraging",
            CommentStyle::Question => "asking a clarifying question that invites a reply",
            CommentStyle::Expert => "expert, backed by concrete data and facts",
        }
    }
}

/// Request for a chain of `branches` posts about `topic`.
pub fn thread_prompt(
    topic: Option<&str>,
    style: Option<&str>,
    branches: u32,
    language: &str,
) -> GenerationRequest {
    let topic = topic.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TOPIC);

    let mut system = String::new();
    system.push_str("You are a content writer for Threads, the social network by Meta.\n");
    system.push_str(&format!(
        "Write a thread chain of exactly {} posts.\n",
        branches
    ));
    system.push_str("Keep every post under 500 characters.\n");
    if let Some(style) = style.map(str::trim).filter(|s| !s.is_empty()) {
        system.push_str(&format!("Tone and style: {}\n", style));
    }
    system.push_str("\nReturn ONLY a valid JSON object in exactly this format:\n");
    system.push_str("{\"branches\": [\"post 1 text\", \"post 2 text\", ...]}\n\n");
    system.push_str("The first post is a hook that grabs attention.\n");
    system.push_str("Each following post builds on the previous one.\n");
    system.push_str("The last post ends with a clear conclusion or call to action.\n");
    system.push_str(&format!("Write in {}.", language));

    GenerationRequest {
        system_prompt: system,
        user_prompt: format!("Generate a thread about: {}", topic),
        max_tokens: THREAD_MAX_TOKENS,
        json_mode: true,
    }
}

/// Request for one short reply to `candidate_text`.
pub fn comment_prompt(
    style: &str,
    niche: Option<&str>,
    candidate_text: &str,
    language: &str,
) -> GenerationRequest {
    let style = CommentStyle::from_name(style);

    let mut system = String::new();
    system.push_str(&format!(
        "You write comments on Threads posts. Write in {}.\n",
        language
    ));
    system.push_str(&format!("Style: {}.\n", style.description()));
    if let Some(niche) = niche.map(str::trim).filter(|n| !n.is_empty()) {
        system.push_str(&format!("The author's niche: {}.\n", niche));
    }
    system.push_str("Rules:\n");
    system.push_str(&format!(
        "- Keep it SHORT: 1-3 sentences (at most {} characters)\n",
        MAX_COMMENT_CHARS
    ));
    system.push_str("- Sound like a real person, not a bot\n");
    system.push_str("- No hashtags\n");
    system.push_str("- No emoji\n");
    system.push_str("- Add real value to the conversation\n");
    system.push_str("- Stay relevant to the post");

    GenerationRequest {
        system_prompt: system,
        user_prompt: format!(
            "Write one comment on this post:\n\n\"{}\"",
            truncate_chars(candidate_text, CANDIDATE_PROMPT_CHARS)
        ),
        max_tokens: COMMENT_MAX_TOKENS,
        json_mode: false,
    }
}
