//! Stored entity types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Post count used when a job does not say how many posts to generate.
pub const DEFAULT_BRANCHES: u32 = 5;

/// Provider name of settings rows that hold user metadata rather than a model.
pub const UTILITY_PROVIDERS: &[&str] = &["user_niche"];

/// A connected Threads account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub access_token: Option<String>,
    /// Remote Threads user id.
    pub threads_user_id: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Access token and remote user id, when both are present.
    pub fn credential(&self) -> Option<(&str, &str)> {
        match (self.access_token.as_deref(), self.threads_user_id.as_deref()) {
            (Some(token), Some(remote)) if !token.is_empty() && !remote.is_empty() => {
                Some((token, remote))
            }
            _ => None,
        }
    }

    /// Whether the stored token expired before `now`.
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_some_and(|at| at < now)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub user_id: String,
    pub username: String,
    pub access_token: Option<String>,
    pub threads_user_id: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// A reusable, pre-written thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    /// JSON array of post texts (or of objects carrying a `text` field).
    pub content: String,
    pub style: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTemplate {
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub style: Option<String>,
}

/// Status of a stored post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Saved without a remote call.
    Draft,
    Published,
    Failed,
}

/// One position of a thread, as recorded after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: String,
    pub account_id: i64,
    pub template_id: Option<i64>,
    pub job_id: Option<i64>,
    pub content: String,
    /// 0-based position in the thread.
    pub thread_position: u32,
    pub remote_id: Option<String>,
    /// Remote id of the previous position, if that one was published.
    pub parent_remote_id: Option<String>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: String,
    pub account_id: i64,
    pub template_id: Option<i64>,
    pub job_id: Option<i64>,
    pub content: String,
    pub thread_position: u32,
    pub remote_id: Option<String>,
    pub parent_remote_id: Option<String>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
}

/// A configured language-model provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSetting {
    pub id: i64,
    pub user_id: String,
    pub provider: String,
    pub model_id: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl LlmSetting {
    /// Rows that store user metadata instead of a usable model.
    pub fn is_utility(&self) -> bool {
        UTILITY_PROVIDERS.contains(&self.provider.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewLlmSetting {
    pub user_id: String,
    pub provider: String,
    pub model_id: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
}

/// Current status of a scheduled job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// One-shot job waiting for its time.
    #[default]
    Pending,
    /// Recurring job between runs.
    Recurring,
    /// Claimed by a worker.
    Running,
    /// One-shot job that finished.
    Completed,
    /// One-shot job that raised an error.
    Failed,
    /// Excluded from the due set until resumed.
    Paused,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Recurring => "recurring",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Paused => "paused",
        }
    }

    /// States a claim may transition out of.
    pub fn is_claimable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Recurring)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "recurring" => Ok(JobStatus::Recurring),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "paused" => Ok(JobStatus::Paused),
            other => Err(StoreError::Invalid(format!("job status '{}'", other))),
        }
    }
}

/// A request to publish a thread, once or on a recurring interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: i64,
    pub user_id: String,
    pub account_id: i64,
    pub template_id: Option<i64>,
    pub topic: Option<String>,
    pub style: Option<String>,
    /// Desired number of posts.
    pub branches: u32,
    /// Explicit provider for generation.
    pub provider: Option<String>,
    /// Explicit model for generation.
    pub model_id: Option<String>,
    /// Recurrence descriptor (`every_6h`, ...). `None` for one-shot jobs.
    pub recurrence: Option<String>,
    pub status: JobStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u32,
    /// When the current run claimed the job.
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledJob {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// The status this job rests in between runs.
    pub fn idle_status(&self) -> JobStatus {
        if self.is_recurring() {
            JobStatus::Recurring
        } else {
            JobStatus::Pending
        }
    }

    /// Whether the job belongs to the due set at `now`.
    ///
    /// `next_run_at` wins when set; otherwise `scheduled_at` decides, so a fresh
    /// one-shot job runs without a precomputed `next_run_at`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.status.is_claimable() {
            return false;
        }
        match (self.next_run_at, self.scheduled_at) {
            (Some(next), _) => next <= now,
            (None, Some(at)) => at <= now,
            (None, None) => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub user_id: String,
    pub account_id: i64,
    pub template_id: Option<i64>,
    pub topic: Option<String>,
    pub style: Option<String>,
    pub branches: Option<u32>,
    pub provider: Option<String>,
    pub model_id: Option<String>,
    pub recurrence: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Autonomous keyword-driven commenting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCampaign {
    pub id: i64,
    pub user_id: String,
    pub account_id: i64,
    /// Comma-separated keyword list.
    pub target_keywords: String,
    pub comment_style: String,
    /// Author niche mentioned in the reply prompt.
    pub niche: Option<String>,
    pub max_comments_per_run: u32,
    pub min_delay_seconds: u64,
    pub max_delay_seconds: u64,
    pub interval_minutes: u32,
    pub active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub total_comments: u64,
    /// When the current run claimed the campaign.
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CommentCampaign {
    /// Trimmed, non-empty keywords.
    pub fn keywords(&self) -> Vec<&str> {
        self.target_keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_run_at.is_none_or(|next| next <= now)
    }
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub user_id: String,
    pub account_id: i64,
    pub target_keywords: String,
    pub comment_style: String,
    pub niche: Option<String>,
    pub max_comments_per_run: u32,
    pub min_delay_seconds: u64,
    pub max_delay_seconds: u64,
    pub interval_minutes: u32,
}

impl NewCampaign {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.min_delay_seconds > self.max_delay_seconds {
            return Err(StoreError::Invalid(format!(
                "delay range: min {}s exceeds max {}s",
                self.min_delay_seconds, self.max_delay_seconds
            )));
        }
        if self.interval_minutes == 0 {
            return Err(StoreError::Invalid("interval: must be at least one minute".into()));
        }
        Ok(())
    }
}

/// Outcome of one attempted comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Published,
    Failed,
}

/// Append-only record of one attempted comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentLog {
    pub id: i64,
    pub campaign_id: i64,
    pub user_id: String,
    pub target_remote_id: String,
    pub target_snippet: String,
    pub comment_text: String,
    pub status: CommentStatus,
    pub error: Option<String>,
    pub remote_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCommentLog {
    pub campaign_id: i64,
    pub user_id: String,
    pub target_remote_id: String,
    pub target_snippet: String,
    pub comment_text: String,
    pub status: CommentStatus,
    pub error: Option<String>,
    pub remote_id: Option<String>,
}

macro_rules! text_enum {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(StoreError::Invalid(format!(
                        "{} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(PostStatus {
    Draft => "draft",
    Published => "published",
    Failed => "failed",
});

text_enum!(CommentStatus {
    Published => "published",
    Failed => "failed",
});
