//! Engine tunables.

use std::time::Duration;

use spindle_llm::DEFAULT_LANGUAGE;

/// Knobs shared by the poller and both engines.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between poll ticks.
    pub poll_interval: Duration,
    /// Wait before the first tick after start.
    pub initial_delay: Duration,
    /// Requeue `running` jobs claimed longer ago than this. `None` disables it.
    pub stale_after: Option<chrono::Duration>,
    /// How far a campaign claim pushes `next_run_at` while the run is in flight.
    pub campaign_lease: chrono::Duration,
    /// Language generated threads and comments are written in.
    pub content_language: String,
    /// Maximum search results fetched per campaign run.
    pub search_limit: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            initial_delay: Duration::from_secs(5),
            stale_after: Some(chrono::Duration::minutes(30)),
            campaign_lease: chrono::Duration::hours(2),
            content_language: DEFAULT_LANGUAGE.to_string(),
            search_limit: 20,
        }
    }
}

impl SchedulerConfig {
    /// Set the stale threshold from minutes; zero turns reclaiming off.
    pub fn with_stale_after_minutes(mut self, minutes: u64) -> Self {
        self.stale_after = (minutes > 0).then(|| chrono::Duration::minutes(minutes as i64));
        self
    }
}
