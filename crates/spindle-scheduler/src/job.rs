//! Scheduled-job execution.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use spindle_llm::{
    GeneratedContent, TextGenerator, parse_template_posts, resolve_setting, thread_prompt,
};
use spindle_store::{JobStatus, NewPost, PostStatus, ScheduledJob, Store};
use spindle_threads::{ChainPublisher, Credential, PublishOutcome};

use crate::guard::ProcessingGuard;
use crate::{Clock, EngineError, Notifier, Recurrence, SchedulerConfig};

/// What one job run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRunReport {
    pub job_id: i64,
    /// Status the job was left in.
    pub status: JobStatus,
    pub published: usize,
    pub failed: usize,
    /// Posts saved as drafts because the account cannot publish.
    pub drafted: usize,
    /// `last_error` as written.
    pub error: Option<String>,
}

enum RunOutcome {
    Published {
        outcome: PublishOutcome,
        handle: String,
    },
    Drafted {
        count: usize,
    },
}

/// Claims due jobs and turns each into a published thread.
pub struct JobEngine {
    store: Arc<dyn Store>,
    generator: Arc<dyn TextGenerator>,
    publisher: ChainPublisher,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    processing: AtomicBool,
}

impl JobEngine {
    pub fn new(
        store: Arc<dyn Store>,
        generator: Arc<dyn TextGenerator>,
        publisher: ChainPublisher,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            generator,
            publisher,
            notifier,
            clock,
            config,
            processing: AtomicBool::new(false),
        }
    }

    /// Run every job that is due now, one at a time.
    ///
    /// A no-op returning an empty list while a previous pass is still running.
    #[tracing::instrument(skip(self))]
    pub async fn process_due(&self) -> Vec<JobRunReport> {
        let Some(_guard) = ProcessingGuard::acquire(&self.processing) else {
            debug!("job pass already in progress, skipping tick");
            return Vec::new();
        };

        let now = self.clock.now();

        if let Some(stale_after) = self.config.stale_after
            && let Err(e) = self.store.reclaim_stale_jobs(now - stale_after).await
        {
            error!(error = %e, "failed to reclaim stale jobs");
        }

        let due = match self.store.list_due_jobs(now).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "failed to list due jobs");
                return Vec::new();
            }
        };

        let mut reports = Vec::new();
        for job in due {
            let claimed = match self.store.claim_job(job.id, self.clock.now()).await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => continue,
                Err(e) => {
                    error!(job_id = job.id, error = %e, "failed to claim job");
                    continue;
                }
            };
            reports.push(self.execute(claimed).await);
        }

        if !reports.is_empty() {
            info!(count = reports.len(), "processed due jobs");
        }
        reports
    }

    /// Run a job that has already been claimed and persist the result.
    #[tracing::instrument(skip(self, job), fields(job_id = job.id, recurring = job.is_recurring()))]
    pub async fn execute(&self, mut job: ScheduledJob) -> JobRunReport {
        let now = self.clock.now();
        let claimed_at = job.claimed_at;
        info!(topic = ?job.topic, template_id = ?job.template_id, "executing job");

        let mut report = JobRunReport {
            job_id: job.id,
            status: job.status,
            published: 0,
            failed: 0,
            drafted: 0,
            error: None,
        };

        match self.run(&job, now).await {
            Ok(RunOutcome::Published { outcome, handle }) => {
                report.published = outcome.published_count();
                report.failed = outcome.failed_count();

                if report.published > 0 {
                    self.notifier
                        .notify_success(&job.user_id, report.published, &handle);
                }
                if !outcome.errors.is_empty() {
                    let summary = outcome.errors.join("; ");
                    self.notifier.notify_failure(&job.user_id, &summary, &handle);
                    report.error = Some(summary);
                }
                info!(
                    published = report.published,
                    failed = report.failed,
                    "job published"
                );
                self.finish(&mut job, now, report.error.clone(), false);
            }
            Ok(RunOutcome::Drafted { count }) => {
                report.drafted = count;
                info!(drafted = count, "account cannot publish, saved drafts");
                self.finish(&mut job, now, None, false);
            }
            Err(e) => {
                warn!(error = %e, "job run failed");
                let handle = self.account_handle(&job).await;
                let message = e.to_string();
                self.notifier.notify_failure(&job.user_id, &message, &handle);
                report.error = Some(message.clone());
                self.finish(&mut job, now, Some(message), true);
            }
        }

        if let Err(e) = self.store.finish_job(&job, claimed_at).await {
            error!(error = %e, "failed to persist job result");
        }

        report.status = job.status;
        report
    }

    async fn run(&self, job: &ScheduledJob, now: DateTime<Utc>) -> Result<RunOutcome, EngineError> {
        let account = self
            .store
            .get_account(job.account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(job.account_id))?;

        if account.is_token_expired(now) {
            return Err(EngineError::TokenExpired(account.username));
        }

        let posts = self.resolve_posts(job).await?;
        if posts.is_empty() {
            return Err(EngineError::NoContent);
        }

        let Some((token, remote_id)) = account.credential() else {
            for (position, content) in posts.iter().enumerate() {
                self.record_post(job, content, position, None, None, PostStatus::Draft, None)
                    .await;
            }
            return Ok(RunOutcome::Drafted { count: posts.len() });
        };

        let credential = Credential::new(token, remote_id);
        let outcome = self.publisher.publish(&credential, &posts).await;

        let published_at = self.clock.now();
        // Each post replied to the last one that published before it
        let mut parent: Option<String> = None;
        for (position, content) in posts.iter().enumerate() {
            let remote_id = outcome.published_ids.get(position).cloned().flatten();
            let (status, at) = match remote_id {
                Some(_) => (PostStatus::Published, Some(published_at)),
                None => (PostStatus::Failed, None),
            };
            self.record_post(job, content, position, remote_id.clone(), parent.clone(), status, at)
                .await;
            if remote_id.is_some() {
                parent = remote_id;
            }
        }

        Ok(RunOutcome::Published {
            outcome,
            handle: account.username,
        })
    }

    /// Template posts when usable, otherwise freshly generated ones.
    async fn resolve_posts(&self, job: &ScheduledJob) -> Result<Vec<String>, EngineError> {
        if let Some(template_id) = job.template_id {
            match self.store.get_template(template_id).await? {
                Some(template) => match parse_template_posts(&template.content) {
                    Some(posts) => {
                        debug!(template_id, count = posts.len(), "using template posts");
                        return Ok(posts);
                    }
                    None => warn!(template_id, "template content unusable, generating instead"),
                },
                None => warn!(template_id, "template not found, generating instead"),
            }
        }
        self.generate_posts(job).await
    }

    async fn generate_posts(&self, job: &ScheduledJob) -> Result<Vec<String>, EngineError> {
        let settings = self.store.list_llm_settings(&job.user_id).await?;
        let resolution = resolve_setting(job.provider.as_deref(), job.model_id.as_deref(), &settings);
        debug!(source = resolution.source(), "resolved LLM provider");

        let config = resolution
            .into_config()
            .ok_or_else(|| EngineError::NoProvider(job.user_id.clone()))?;

        let request = thread_prompt(
            job.topic.as_deref(),
            job.style.as_deref(),
            job.branches,
            &self.config.content_language,
        );
        let text = self.generator.generate(&config, &request).await?;
        let content = GeneratedContent::parse(&text);
        if matches!(content, GeneratedContent::Raw(_)) {
            debug!("generation was not structured, using raw text");
        }
        Ok(content.into_posts())
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_post(
        &self,
        job: &ScheduledJob,
        content: &str,
        position: usize,
        remote_id: Option<String>,
        parent_remote_id: Option<String>,
        status: PostStatus,
        published_at: Option<DateTime<Utc>>,
    ) {
        let post = NewPost {
            user_id: job.user_id.clone(),
            account_id: job.account_id,
            template_id: job.template_id,
            job_id: Some(job.id),
            content: content.to_string(),
            thread_position: position as u32,
            remote_id,
            parent_remote_id,
            status,
            published_at,
        };
        if let Err(e) = self.store.create_post(post).await {
            error!(position, error = %e, "failed to record post");
        }
    }

    /// Apply the end-of-run state transition.
    fn finish(&self, job: &mut ScheduledJob, now: DateTime<Utc>, error: Option<String>, raised: bool) {
        job.last_run_at = Some(now);
        job.last_error = error;
        job.run_count += 1;
        job.claimed_at = None;

        match job.recurrence.as_deref() {
            Some(descriptor) => {
                let recurrence = Recurrence::parse(descriptor);
                let base = job.next_run_at.or(job.scheduled_at);
                let next = recurrence.next_run(base, now);
                job.status = JobStatus::Recurring;
                job.next_run_at = Some(next);
                debug!(next_run_at = %next, "rescheduled recurring job");
            }
            None => {
                job.status = if raised {
                    JobStatus::Failed
                } else {
                    JobStatus::Completed
                };
                job.next_run_at = None;
            }
        }
    }

    async fn account_handle(&self, job: &ScheduledJob) -> String {
        match self.store.get_account(job.account_id).await {
            Ok(Some(account)) => account.username,
            _ => format!("account {}", job.account_id),
        }
    }
}
