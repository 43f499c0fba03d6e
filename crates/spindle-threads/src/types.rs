//! Core types for the Threads API.

use serde::{Deserialize, Serialize};

/// Access credential for one connected Threads account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Long-lived OAuth access token.
    pub access_token: String,
    /// Remote Threads user id.
    pub user_id: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            user_id: user_id.into(),
        }
    }
}

/// A post returned by keyword search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Result of publishing a chain of posts.
///
/// `published_ids` holds exactly one slot per input post, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub published_ids: Vec<Option<String>>,
    pub errors: Vec<String>,
}

impl PublishOutcome {
    /// Number of posts that made it onto the platform.
    pub fn published_count(&self) -> usize {
        self.published_ids.iter().filter(|id| id.is_some()).count()
    }

    /// Number of posts that did not.
    pub fn failed_count(&self) -> usize {
        self.published_ids.len() - self.published_count()
    }

    /// True when every post was published.
    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Error object embedded in Graph API responses.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphError {
    #[serde(default)]
    pub message: Option<String>,
}

/// Response from the container create and publish endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct IdResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<GraphError>,
}

/// Response from `threads/search`.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub data: Vec<RawSearchItem>,
    #[serde(default)]
    pub error: Option<GraphError>,
}

/// Search item before filtering out entries without id or text.
#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_outcome_counts() {
        let outcome = PublishOutcome {
            published_ids: vec![Some("a".into()), None, Some("c".into())],
            errors: vec!["Post 2: boom".into()],
        };
        assert_eq!(outcome.published_count(), 2);
        assert_eq!(outcome.failed_count(), 1);
        assert!(!outcome.is_complete());
    }

    #[test]
    fn test_empty_outcome_is_complete() {
        assert!(PublishOutcome::default().is_complete());
    }
}
