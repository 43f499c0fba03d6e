//! Daemon command: wires the store, adapters and engines, then polls until
//! Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use miette::Result;
use tokio::sync::watch;
use tracing::{info, warn};

use spindle_llm::ChatClient;
use spindle_scheduler::{
    CampaignEngine, JobEngine, LogNotifier, Notifier, Poller, SchedulerConfig, SystemClock,
    WebhookNotifier,
};
use spindle_store::SqliteStore;
use spindle_threads::{ChainPublisher, ThreadsApi, ThreadsClient};

/// Configuration for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub threads_api_url: String,
    /// Seconds between poller ticks.
    pub poll_interval: u64,
    /// Seconds before the first tick.
    pub initial_delay: u64,
    /// Minutes before a `running` job is reclaimed (0 disables reclaiming).
    pub stale_after_minutes: u64,
    /// Minutes a claimed campaign stays out of the due set while it runs.
    pub campaign_lease_minutes: u64,
    pub content_language: String,
    /// POST notification events here instead of only logging them.
    pub notify_webhook: Option<String>,
    /// Milliseconds between posts of one chain.
    pub post_delay_ms: u64,
    pub campaigns_enabled: bool,
}

impl DaemonConfig {
    /// Engine tunables derived from the daemon flags.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.poll_interval.max(1)),
            initial_delay: Duration::from_secs(self.initial_delay),
            campaign_lease: chrono::Duration::minutes(self.campaign_lease_minutes.max(1) as i64),
            content_language: self.content_language.clone(),
            ..SchedulerConfig::default()
        }
        .with_stale_after_minutes(self.stale_after_minutes)
    }
}

/// Run the daemon until a shutdown signal arrives.
pub async fn run(config: DaemonConfig) -> Result<()> {
    info!(
        db = %config.db_path.display(),
        threads_api = %config.threads_api_url,
        "starting spindle daemon"
    );

    let scheduler_config = config.scheduler_config();

    let store = Arc::new(
        SqliteStore::open(&config.db_path)
            .map_err(|e| miette::miette!("failed to open database: {}", e))?,
    );

    let threads: Arc<dyn ThreadsApi> = Arc::new(
        ThreadsClient::new(config.threads_api_url.clone())
            .map_err(|e| miette::miette!("failed to create Threads client: {}", e))?,
    );
    let generator = Arc::new(
        ChatClient::new().map_err(|e| miette::miette!("failed to create LLM client: {}", e))?,
    );
    let notifier: Arc<dyn Notifier> = match config.notify_webhook.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            info!(url = %url, "delivering notifications to webhook");
            Arc::new(
                WebhookNotifier::new(url)
                    .map_err(|e| miette::miette!("failed to create webhook notifier: {}", e))?,
            )
        }
        _ => Arc::new(LogNotifier),
    };
    let clock = Arc::new(SystemClock);

    let publisher = ChainPublisher::new(threads.clone())
        .with_post_delay(Duration::from_millis(config.post_delay_ms));

    let jobs = Arc::new(JobEngine::new(
        store.clone(),
        generator.clone(),
        publisher,
        notifier,
        clock.clone(),
        scheduler_config.clone(),
    ));

    let mut poller = Poller::new(jobs, scheduler_config.poll_interval)
        .with_initial_delay(scheduler_config.initial_delay);
    if config.campaigns_enabled {
        poller = poller.with_campaigns(Arc::new(CampaignEngine::new(
            store,
            generator,
            threads,
            clock,
            scheduler_config,
        )));
    } else {
        warn!("comment campaigns disabled");
    }

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle shutdown signals
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    poller.run(shutdown_rx).await;

    info!("daemon stopped");
    Ok(())
}
