//! Operator actions on scheduled jobs.

use std::sync::Arc;

use tracing::info;

use spindle_store::{JobStatus, ScheduledJob, Store, StoreError};

use crate::{Clock, EngineError};

/// Pause, resume, run-now, requeue and delete, applied through the store.
pub struct JobControl {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl JobControl {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Take a waiting job out of the due set.
    pub async fn pause(&self, id: i64) -> Result<ScheduledJob, EngineError> {
        match self.store.pause_job(id).await? {
            Some(job) => {
                info!(job_id = id, "paused job");
                Ok(job)
            }
            None => Err(self.rejected(id, "paused").await),
        }
    }

    /// Return a paused job to its idle state.
    ///
    /// The next run is the later of the job's previous due time and now, so a
    /// job paused past its due time runs on the next tick.
    pub async fn resume(&self, id: i64) -> Result<ScheduledJob, EngineError> {
        let job = self.load(id).await?;
        if job.status != JobStatus::Paused {
            return Err(wrong_state(&job, "resumed"));
        }
        let now = self.clock.now();
        let base = job.next_run_at.or(job.scheduled_at).unwrap_or(now);
        let next_run_at = base.max(now);

        match self.store.release_job(id, &[JobStatus::Paused], next_run_at).await? {
            Some(job) => {
                info!(job_id = id, next_run_at = %next_run_at, "resumed job");
                Ok(job)
            }
            None => Err(self.rejected(id, "resumed").await),
        }
    }

    /// Make a waiting or paused job due immediately.
    ///
    /// A job that is running is left alone; releasing it would let a second
    /// worker claim it mid-run.
    pub async fn run_now(&self, id: i64) -> Result<ScheduledJob, EngineError> {
        let from = [JobStatus::Pending, JobStatus::Recurring, JobStatus::Paused];
        match self.store.release_job(id, &from, self.clock.now()).await? {
            Some(job) => {
                info!(job_id = id, "job marked due now");
                Ok(job)
            }
            None => Err(self.rejected(id, "run now").await),
        }
    }

    /// Release a job stuck in `running` so the next tick runs it again.
    pub async fn requeue(&self, id: i64) -> Result<ScheduledJob, EngineError> {
        match self
            .store
            .release_job(id, &[JobStatus::Running], self.clock.now())
            .await?
        {
            Some(job) => {
                info!(job_id = id, "requeued running job");
                Ok(job)
            }
            None => Err(self.rejected(id, "requeued").await),
        }
    }

    pub async fn delete(&self, id: i64) -> Result<(), EngineError> {
        if !self.store.delete_job(id).await? {
            return Err(not_found(id));
        }
        info!(job_id = id, "deleted job");
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<ScheduledJob, EngineError> {
        self.store.get_job(id).await?.ok_or_else(|| not_found(id))
    }

    /// Explain why a conditional transition matched nothing.
    async fn rejected(&self, id: i64, action: &'static str) -> EngineError {
        match self.load(id).await {
            Ok(job) => wrong_state(&job, action),
            Err(e) => e,
        }
    }
}

fn not_found(id: i64) -> EngineError {
    EngineError::Store(StoreError::NotFound { entity: "job", id })
}

fn wrong_state(job: &ScheduledJob, action: &'static str) -> EngineError {
    EngineError::JobState {
        id: job.id,
        status: job.status,
        action,
    }
}
