//! The storage seam the engines run against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::StoreError;
use crate::types::*;

/// Persistent state shared by the poller, the engines and the CLI.
///
/// `claim_job` and `claim_campaign` must be atomic with respect to every other
/// caller of the same store: of any number of concurrent claims for one id, at
/// most one returns `Some`.
#[async_trait]
pub trait Store: Send + Sync {
    // Jobs

    /// Jobs in `pending`/`recurring` whose effective run time is at or before
    /// `now`, oldest first.
    async fn list_due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, StoreError>;

    /// Move a due job to `running`, returning the claimed row, or `None` if
    /// another worker got there first or the job is no longer claimable.
    async fn claim_job(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledJob>, StoreError>;

    async fn get_job(&self, id: i64) -> Result<Option<ScheduledJob>, StoreError>;

    async fn list_jobs(&self, user_id: Option<&str>) -> Result<Vec<ScheduledJob>, StoreError>;

    async fn create_job(&self, job: NewJob) -> Result<ScheduledJob, StoreError>;

    /// Persist the end-of-run state of a job claimed at `claimed_at`.
    ///
    /// Writes only while that claim still holds. `false` means the job was
    /// requeued, reclaimed or deleted during the run and the result was dropped.
    async fn finish_job(
        &self,
        job: &ScheduledJob,
        claimed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    /// Move a `pending`/`recurring` job to `paused`. `None` if it was in any
    /// other state.
    async fn pause_job(&self, id: i64) -> Result<Option<ScheduledJob>, StoreError>;

    /// Return a job in one of `from` to its idle status, due at `next_run_at`,
    /// and drop any claim. `None` if the job was not in one of `from`.
    async fn release_job(
        &self,
        id: i64,
        from: &[JobStatus],
        next_run_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledJob>, StoreError>;

    async fn delete_job(&self, id: i64) -> Result<bool, StoreError>;

    /// Return jobs stuck in `running` since before `cutoff` to their idle state.
    async fn reclaim_stale_jobs(&self, cutoff: DateTime<Utc>) -> Result<Vec<i64>, StoreError>;

    // Campaigns

    async fn list_due_campaigns(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CommentCampaign>, StoreError>;

    /// Take a due, active campaign by pushing its `next_run_at` to
    /// `lease_until`. `None` if it was not due or someone else took it.
    async fn claim_campaign(
        &self,
        id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<CommentCampaign>, StoreError>;

    /// Take an active campaign whatever its schedule, unless a run holds it.
    /// `None` if it is inactive, missing or mid-run.
    async fn claim_campaign_now(
        &self,
        id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<CommentCampaign>, StoreError>;

    async fn get_campaign(&self, id: i64) -> Result<Option<CommentCampaign>, StoreError>;

    async fn list_campaigns(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<CommentCampaign>, StoreError>;

    async fn create_campaign(&self, campaign: NewCampaign) -> Result<CommentCampaign, StoreError>;

    /// Flip only the `active` flag.
    async fn set_campaign_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Option<CommentCampaign>, StoreError>;

    /// Record a finished run: stamp `last_run_at`, set `next_run_at`, add
    /// `published` to the running total and drop the claim. Other columns are
    /// left alone.
    async fn reschedule_campaign(
        &self,
        id: i64,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
        published: u64,
    ) -> Result<bool, StoreError>;

    async fn delete_campaign(&self, id: i64) -> Result<bool, StoreError>;

    // Accounts, templates, posts, logs, settings

    async fn get_account(&self, id: i64) -> Result<Option<Account>, StoreError>;

    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    async fn get_template(&self, id: i64) -> Result<Option<Template>, StoreError>;

    async fn create_template(&self, template: NewTemplate) -> Result<Template, StoreError>;

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn list_posts_for_job(&self, job_id: i64) -> Result<Vec<Post>, StoreError>;

    async fn create_comment_log(&self, log: NewCommentLog) -> Result<CommentLog, StoreError>;

    async fn list_comment_logs(&self, campaign_id: i64) -> Result<Vec<CommentLog>, StoreError>;

    /// Settings rows for `user_id`, default first then oldest first.
    async fn list_llm_settings(&self, user_id: &str) -> Result<Vec<LlmSetting>, StoreError>;

    async fn create_llm_setting(&self, setting: NewLlmSetting) -> Result<LlmSetting, StoreError>;
}
