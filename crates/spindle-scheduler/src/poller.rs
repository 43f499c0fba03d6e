//! Fixed-interval driver for both engines.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, sleep};
use tracing::{debug, info, warn};

use crate::{CampaignEngine, JobEngine};

/// Wakes up every poll interval and hands due work to the engines.
///
/// Each tick starts the job pass and the campaign pass as separate tasks, so a
/// slow campaign never delays publishing. A pass still running from an
/// earlier tick makes the new one a no-op.
pub struct Poller {
    jobs: Arc<JobEngine>,
    campaigns: Option<Arc<CampaignEngine>>,
    poll_interval: Duration,
    initial_delay: Duration,
}

impl Poller {
    pub fn new(jobs: Arc<JobEngine>, poll_interval: Duration) -> Self {
        Self {
            jobs,
            campaigns: None,
            poll_interval,
            initial_delay: Duration::ZERO,
        }
    }

    pub fn with_campaigns(mut self, campaigns: Arc<CampaignEngine>) -> Self {
        self.campaigns = Some(campaigns);
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Start one pass of each pipeline.
    pub fn tick(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);

        let jobs = self.jobs.clone();
        handles.push(tokio::spawn(async move {
            jobs.process_due().await;
        }));

        if let Some(campaigns) = &self.campaigns {
            let campaigns = campaigns.clone();
            handles.push(tokio::spawn(async move {
                campaigns.process_due().await;
            }));
        }

        handles
    }

    /// Poll until `shutdown` flips to true, then wait for in-flight passes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            campaigns = self.campaigns.is_some(),
            "poller starting"
        );

        tokio::select! {
            _ = shutdown.changed() => {}
            _ = sleep(self.initial_delay) => {}
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        loop {
            if *shutdown.borrow() {
                info!("poller shutting down");
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone; nobody can stop us any more
                        info!("shutdown channel closed");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    in_flight.retain(|h| !h.is_finished());
                    debug!(in_flight = in_flight.len(), "poll tick");
                    in_flight.extend(self.tick());
                }
            }
        }

        for handle in in_flight {
            if let Err(e) = handle.await {
                warn!(error = %e, "pipeline task ended abnormally");
            }
        }
        info!("poller shut down gracefully");
    }
}
