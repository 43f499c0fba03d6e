//! Turning model output and stored templates into post lists.

use serde_json::Value;

use crate::MAX_COMMENT_CHARS;

/// What a thread generation call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedContent {
    /// A `{"branches": [...]}` object was found.
    Structured(Vec<String>),
    /// Anything else; used verbatim as one post.
    Raw(String),
}

impl GeneratedContent {
    pub fn parse(text: &str) -> Self {
        let body = strip_code_fence(text);
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body)
            && let Some(Value::Array(items)) = map.get("branches")
        {
            return GeneratedContent::Structured(items.iter().filter_map(item_text).collect());
        }
        GeneratedContent::Raw(text.to_string())
    }

    /// Posts to publish, in order. Blank raw output yields nothing.
    pub fn into_posts(self) -> Vec<String> {
        match self {
            GeneratedContent::Structured(posts) => posts,
            GeneratedContent::Raw(text) if text.trim().is_empty() => Vec::new(),
            GeneratedContent::Raw(text) => vec![text],
        }
    }
}

/// Posts stored in a template's JSON content.
///
/// `None` when the content is not a JSON array or holds no usable posts, in
/// which case the caller generates content instead.
pub fn parse_template_posts(content: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => {
            let posts: Vec<String> = items.iter().filter_map(item_text).collect();
            (!posts.is_empty()).then_some(posts)
        }
        _ => None,
    }
}

/// Normalise a generated reply: trim, drop one pair of wrapping quotes, and
/// cap the length.
pub fn clean_comment(text: &str) -> String {
    const QUOTES: &[char] = &['"', '\'', '«', '»', '“', '”'];

    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix(QUOTES) {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix(QUOTES) {
        s = rest;
    }
    truncate_chars(s.trim(), MAX_COMMENT_CHARS).trim_end().to_string()
}

/// Prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn item_text(item: &Value) -> Option<String> {
    let text = match item {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("text") {
            Some(Value::String(s)) => s.clone(),
            _ => item.to_string(),
        },
        Value::Null => return None,
        other => other.to_string(),
    };
    (!text.trim().is_empty()).then_some(text)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an info string such as `json`
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
