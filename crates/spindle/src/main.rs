//! Spindle: scheduled Threads publishing
//!
//! Main binary with subcommands:
//! - `daemon`: poll for due jobs and comment campaigns and run them
//! - `account`, `template`, `llm`: register the entities jobs refer to
//! - `job`: create, list, pause, resume, run-now, requeue, delete
//! - `campaign`: create, list, toggle, run now, inspect logs, delete

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod admin;
mod daemon;

use admin::{AccountCommand, CampaignCommand, JobCommand, LlmCommand, TemplateCommand};

#[derive(Parser, Debug)]
#[command(name = "spindle")]
#[command(about = "Scheduled Threads publishing", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "SPINDLE_DB_PATH", default_value = "spindle.db", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the publishing daemon
    Daemon {
        /// Threads Graph API base URL
        #[arg(long, env = "SPINDLE_THREADS_API_URL", default_value = spindle_threads::DEFAULT_API_URL)]
        threads_api_url: String,

        /// Poll interval in seconds
        #[arg(long, default_value = "30")]
        poll_interval: u64,

        /// Delay before the first poll in seconds
        #[arg(long, default_value = "5")]
        initial_delay: u64,

        /// Requeue jobs left running longer than this many minutes (0 disables)
        #[arg(long, default_value = "30")]
        stale_after_minutes: u64,

        /// Minutes a running campaign stays out of the due set
        #[arg(long, default_value = "120")]
        campaign_lease_minutes: u64,

        /// Language for generated threads and comments
        #[arg(long, env = "SPINDLE_CONTENT_LANGUAGE", default_value = spindle_llm::DEFAULT_LANGUAGE)]
        content_language: String,

        /// Webhook that receives publish notifications
        #[arg(long, env = "SPINDLE_NOTIFY_WEBHOOK")]
        notify_webhook: Option<String>,

        /// Pause between posts of one thread in milliseconds
        #[arg(long, default_value = "1500")]
        post_delay_ms: u64,

        /// Only publish scheduled jobs
        #[arg(long)]
        no_campaigns: bool,
    },

    /// Manage Threads accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Manage thread templates
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Manage LLM settings
    #[command(subcommand)]
    Llm(LlmCommand),

    /// Manage scheduled jobs
    #[command(subcommand)]
    Job(JobCommand),

    /// Manage comment campaigns
    #[command(subcommand)]
    Campaign(CampaignCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "spindle=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            threads_api_url,
            poll_interval,
            initial_delay,
            stale_after_minutes,
            campaign_lease_minutes,
            content_language,
            notify_webhook,
            post_delay_ms,
            no_campaigns,
        } => {
            daemon::run(daemon::DaemonConfig {
                db_path: cli.db,
                threads_api_url,
                poll_interval,
                initial_delay,
                stale_after_minutes,
                campaign_lease_minutes,
                content_language,
                notify_webhook,
                post_delay_ms,
                campaigns_enabled: !no_campaigns,
            })
            .await
        }
        Commands::Account(command) => admin::account(&cli.db, command).await,
        Commands::Template(command) => admin::template(&cli.db, command).await,
        Commands::Llm(command) => admin::llm(&cli.db, command).await,
        Commands::Job(command) => admin::job(&cli.db, command).await,
        Commands::Campaign(command) => admin::campaign(&cli.db, command).await,
    }
}
