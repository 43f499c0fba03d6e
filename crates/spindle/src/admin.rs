//! Administrative subcommands: the externally triggered transitions the
//! daemon never performs on its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use miette::Result;
use tracing::info;

use spindle_llm::{ChatClient, Provider};
use spindle_scheduler::{
    CampaignEngine, CampaignRunSummary, JobControl, Recurrence, SchedulerConfig, SystemClock,
};
use spindle_store::{
    CommentCampaign, NewAccount, NewCampaign, NewJob, NewLlmSetting, NewTemplate, ScheduledJob,
    SqliteStore, Store, UTILITY_PROVIDERS,
};
use spindle_threads::ThreadsClient;

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", s, e))
}

/// Accept only known recurrence descriptors at creation time.
pub fn parse_recurrence(s: &str) -> Result<String, String> {
    Recurrence::from_descriptor(s)
        .map(|r| r.as_str().to_string())
        .ok_or_else(|| {
            let known: Vec<&str> = Recurrence::ALL.iter().map(|r| r.as_str()).collect();
            format!("unknown recurrence '{}', expected one of: {}", s, known.join(", "))
        })
}

/// Accept known chat providers plus the utility rows that hold user metadata.
pub fn parse_provider(s: &str) -> Result<String, String> {
    if s.parse::<Provider>().is_ok() || UTILITY_PROVIDERS.contains(&s) {
        return Ok(s.to_string());
    }
    let known: Vec<&str> = Provider::ALL
        .iter()
        .map(|p| p.as_str())
        .chain(UTILITY_PROVIDERS.iter().copied())
        .collect();
    Err(format!("unknown provider '{}', expected one of: {}", s, known.join(", ")))
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Register a Threads account
    Add {
        /// Owning user
        #[arg(long)]
        user: String,

        /// Threads handle (without @)
        #[arg(long)]
        username: String,

        /// Long-lived access token
        #[arg(long, env = "SPINDLE_ACCESS_TOKEN")]
        access_token: Option<String>,

        /// Remote Threads user id
        #[arg(long)]
        threads_user_id: Option<String>,

        /// Token expiry (RFC 3339)
        #[arg(long, value_parser = parse_datetime)]
        token_expires_at: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// Store a reusable thread
    Add {
        #[arg(long)]
        user: String,

        #[arg(long)]
        title: String,

        /// One post of the thread; repeat in order
        #[arg(long = "post", required = true)]
        posts: Vec<String>,

        #[arg(long)]
        style: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum LlmCommand {
    /// Add a model setting for a user
    Add {
        #[arg(long)]
        user: String,

        /// Provider name (openrouter, groq, openai, anthropic, google, xai, ollama,
        /// custom), or user_niche to store a niche in --api-key
        #[arg(long, value_parser = parse_provider)]
        provider: String,

        #[arg(long)]
        model: String,

        #[arg(long, env = "SPINDLE_LLM_API_KEY")]
        api_key: Option<String>,

        #[arg(long)]
        base_url: Option<String>,

        /// Use this setting when a job names no model
        #[arg(long)]
        default: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobCommand {
    /// Schedule a thread
    Add {
        #[arg(long)]
        user: String,

        #[arg(long)]
        account: i64,

        /// Publish a stored template instead of generating
        #[arg(long)]
        template: Option<i64>,

        #[arg(long)]
        topic: Option<String>,

        #[arg(long)]
        style: Option<String>,

        /// Number of posts to generate
        #[arg(long)]
        branches: Option<u32>,

        #[arg(long, value_parser = parse_provider)]
        provider: Option<String>,

        #[arg(long)]
        model: Option<String>,

        /// Repeat the job (every_1h .. every_week)
        #[arg(long, value_parser = parse_recurrence)]
        recurrence: Option<String>,

        /// First run (RFC 3339); defaults to now
        #[arg(long, value_parser = parse_datetime)]
        at: Option<DateTime<Utc>>,
    },

    /// List jobs
    List {
        #[arg(long)]
        user: Option<String>,
    },

    /// Show the posts a job recorded
    Posts { id: i64 },

    /// Take a waiting job out of the schedule
    Pause { id: i64 },

    /// Put a paused job back on the schedule
    Resume { id: i64 },

    /// Make a job due on the next tick
    RunNow { id: i64 },

    /// Release a job stuck in running
    Requeue { id: i64 },

    /// Delete a job
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum CampaignCommand {
    /// Create a comment campaign
    Add {
        #[arg(long)]
        user: String,

        #[arg(long)]
        account: i64,

        /// Comma-separated search keywords
        #[arg(long)]
        keywords: String,

        /// helpful, witty, supportive, question or expert
        #[arg(long, default_value = "helpful")]
        style: String,

        #[arg(long)]
        niche: Option<String>,

        #[arg(long, default_value = "5")]
        max_per_run: u32,

        /// Lower bound of the pause between comments, in seconds
        #[arg(long, default_value = "60")]
        min_delay: u64,

        /// Upper bound of the pause between comments, in seconds
        #[arg(long, default_value = "300")]
        max_delay: u64,

        /// Minutes between runs
        #[arg(long, default_value = "60")]
        interval: u32,
    },

    /// List campaigns
    List {
        #[arg(long)]
        user: Option<String>,
    },

    /// Flip a campaign between active and paused
    Toggle { id: i64 },

    /// Run a campaign now, ahead of its schedule
    Run {
        id: i64,

        /// Threads Graph API base URL
        #[arg(long, env = "SPINDLE_THREADS_API_URL", default_value = spindle_threads::DEFAULT_API_URL)]
        threads_api_url: String,

        /// Language for generated comments
        #[arg(long, env = "SPINDLE_CONTENT_LANGUAGE", default_value = spindle_llm::DEFAULT_LANGUAGE)]
        content_language: String,
    },

    /// Show the comment log of a campaign
    Logs { id: i64 },

    /// Delete a campaign and its log
    Delete { id: i64 },
}

fn open(db_path: &std::path::Path) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(db_path)
        .map_err(|e| miette::miette!("failed to open database: {}", e))?;
    Ok(Arc::new(store))
}

pub async fn account(db_path: &std::path::Path, command: AccountCommand) -> Result<()> {
    let store = open(db_path)?;
    match command {
        AccountCommand::Add {
            user,
            username,
            access_token,
            threads_user_id,
            token_expires_at,
        } => {
            let account = store
                .create_account(NewAccount {
                    user_id: user,
                    username: username.trim_start_matches('@').to_string(),
                    access_token,
                    threads_user_id,
                    token_expires_at,
                })
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            let connected = if account.credential().is_some() {
                "connected"
            } else {
                "draft only"
            };
            println!("Account {} @{} ({})", account.id, account.username, connected);
        }
    }
    Ok(())
}

pub async fn template(db_path: &std::path::Path, command: TemplateCommand) -> Result<()> {
    let store = open(db_path)?;
    match command {
        TemplateCommand::Add {
            user,
            title,
            posts,
            style,
        } => {
            let content = serde_json::to_string(&posts).map_err(|e| miette::miette!("{}", e))?;
            let template = store
                .create_template(NewTemplate {
                    user_id: user,
                    title,
                    content,
                    style,
                })
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            println!("Template {} \"{}\" ({} posts)", template.id, template.title, posts.len());
        }
    }
    Ok(())
}

pub async fn llm(db_path: &std::path::Path, command: LlmCommand) -> Result<()> {
    let store = open(db_path)?;
    match command {
        LlmCommand::Add {
            user,
            provider,
            model,
            api_key,
            base_url,
            default,
        } => {
            let setting = store
                .create_llm_setting(NewLlmSetting {
                    user_id: user,
                    provider,
                    model_id: model,
                    api_key,
                    base_url,
                    is_default: default,
                    is_active: true,
                })
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            println!(
                "LLM setting {} {}/{}{}",
                setting.id,
                setting.provider,
                setting.model_id,
                if setting.is_default { " (default)" } else { "" }
            );
        }
    }
    Ok(())
}

pub async fn job(db_path: &std::path::Path, command: JobCommand) -> Result<()> {
    let store = open(db_path)?;
    let control = JobControl::new(store.clone(), Arc::new(SystemClock));

    match command {
        JobCommand::Add {
            user,
            account,
            template,
            topic,
            style,
            branches,
            provider,
            model,
            recurrence,
            at,
        } => {
            let job = store
                .create_job(NewJob {
                    user_id: user,
                    account_id: account,
                    template_id: template,
                    topic,
                    style,
                    branches,
                    provider,
                    model_id: model,
                    recurrence,
                    scheduled_at: Some(at.unwrap_or_else(Utc::now)),
                })
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            info!(job_id = job.id, "job created");
            print_job(&job);
        }
        JobCommand::List { user } => {
            let jobs = store
                .list_jobs(user.as_deref())
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            if jobs.is_empty() {
                println!("No jobs.");
            }
            for job in &jobs {
                print_job(job);
            }
        }
        JobCommand::Posts { id } => {
            let posts = store
                .list_posts_for_job(id)
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            for post in posts {
                println!(
                    "  [{}] {:<9} {:<20} {}",
                    post.thread_position,
                    post.status.as_str(),
                    post.remote_id.as_deref().unwrap_or("-"),
                    post.content
                );
            }
        }
        JobCommand::Pause { id } => print_job(&control.pause(id).await.map_err(to_report)?),
        JobCommand::Resume { id } => print_job(&control.resume(id).await.map_err(to_report)?),
        JobCommand::RunNow { id } => print_job(&control.run_now(id).await.map_err(to_report)?),
        JobCommand::Requeue { id } => print_job(&control.requeue(id).await.map_err(to_report)?),
        JobCommand::Delete { id } => {
            control.delete(id).await.map_err(to_report)?;
            println!("Deleted job {}", id);
        }
    }
    Ok(())
}

pub async fn campaign(db_path: &std::path::Path, command: CampaignCommand) -> Result<()> {
    let store = open(db_path)?;
    match command {
        CampaignCommand::Add {
            user,
            account,
            keywords,
            style,
            niche,
            max_per_run,
            min_delay,
            max_delay,
            interval,
        } => {
            let campaign = store
                .create_campaign(NewCampaign {
                    user_id: user,
                    account_id: account,
                    target_keywords: keywords,
                    comment_style: style,
                    niche,
                    max_comments_per_run: max_per_run,
                    min_delay_seconds: min_delay,
                    max_delay_seconds: max_delay,
                    interval_minutes: interval,
                })
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            print_campaign(&campaign);
        }
        CampaignCommand::List { user } => {
            let campaigns = store
                .list_campaigns(user.as_deref())
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            if campaigns.is_empty() {
                println!("No campaigns.");
            }
            for campaign in &campaigns {
                print_campaign(campaign);
            }
        }
        CampaignCommand::Toggle { id } => {
            let current = store
                .get_campaign(id)
                .await
                .map_err(|e| miette::miette!("{}", e))?
                .ok_or_else(|| miette::miette!("campaign {} not found", id))?;
            let campaign = store
                .set_campaign_active(id, !current.active)
                .await
                .map_err(|e| miette::miette!("{}", e))?
                .ok_or_else(|| miette::miette!("campaign {} not found", id))?;
            info!(campaign_id = id, active = campaign.active, "campaign toggled");
            print_campaign(&campaign);
        }
        CampaignCommand::Run {
            id,
            threads_api_url,
            content_language,
        } => {
            let engine = campaign_engine(store, threads_api_url, content_language)?;
            let summary = engine.run_now(id).await.map_err(to_report)?;
            print_run_summary(&summary);
        }
        CampaignCommand::Logs { id } => {
            let logs = store
                .list_comment_logs(id)
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            for log in logs {
                println!(
                    "  {} {:<9} {} -> {}{}",
                    log.created_at.format("%Y-%m-%d %H:%M"),
                    log.status.as_str(),
                    log.target_remote_id,
                    log.comment_text,
                    log.error.map(|e| format!(" ({})", e)).unwrap_or_default()
                );
            }
        }
        CampaignCommand::Delete { id } => {
            if !store
                .delete_campaign(id)
                .await
                .map_err(|e| miette::miette!("{}", e))?
            {
                return Err(miette::miette!("campaign {} not found", id));
            }
            println!("Deleted campaign {}", id);
        }
    }
    Ok(())
}

/// An engine wired to the real Threads and LLM clients.
fn campaign_engine(
    store: Arc<SqliteStore>,
    threads_api_url: String,
    content_language: String,
) -> Result<CampaignEngine> {
    let threads = ThreadsClient::new(threads_api_url)
        .map_err(|e| miette::miette!("failed to create Threads client: {}", e))?;
    let generator =
        ChatClient::new().map_err(|e| miette::miette!("failed to create LLM client: {}", e))?;
    Ok(CampaignEngine::new(
        store,
        Arc::new(generator),
        Arc::new(threads),
        Arc::new(SystemClock),
        SchedulerConfig {
            content_language,
            ..SchedulerConfig::default()
        },
    ))
}

fn to_report(e: spindle_scheduler::EngineError) -> miette::Report {
    miette::miette!("{}", e)
}

fn print_job(job: &ScheduledJob) {
    let what = match (job.template_id, job.topic.as_deref()) {
        (Some(template), _) => format!("template {}", template),
        (None, Some(topic)) => format!("\"{}\"", topic),
        (None, None) => "default topic".to_string(),
    };
    println!(
        "Job {:>4} {:<10} {:<10} next {} runs {} {}{}",
        job.id,
        job.status.as_str(),
        job.recurrence.as_deref().unwrap_or("once"),
        job.next_run_at
            .or(job.scheduled_at)
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into()),
        job.run_count,
        what,
        job.last_error
            .as_deref()
            .map(|e| format!(" [{}]", e))
            .unwrap_or_default()
    );
}

fn print_run_summary(summary: &CampaignRunSummary) {
    for line in &summary.logs {
        println!("  {}", line);
    }
    println!(
        "Campaign {}: {} published, {} failed",
        summary.campaign_id, summary.published, summary.failed
    );
}

fn print_campaign(campaign: &CommentCampaign) {
    println!(
        "Campaign {:>4} {:<6} every {}m, {} total, keywords: {}",
        campaign.id,
        if campaign.active { "active" } else { "paused" },
        campaign.interval_minutes,
        campaign.total_comments,
        campaign.keywords().join(", ")
    );
}
