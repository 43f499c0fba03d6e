//! Keyword-driven comment campaigns.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, error, info, warn};

use spindle_llm::{
    ProviderConfig, TextGenerator, clean_comment, comment_prompt, resolve_setting, truncate_chars,
};
use spindle_store::{CommentCampaign, CommentStatus, NewCommentLog, Store, StoreError};
use spindle_threads::{Credential, SearchResult, ThreadsApi};

use crate::guard::ProcessingGuard;
use crate::{Clock, EngineError, SchedulerConfig};

/// Longest target excerpt kept in a comment log.
pub const SNIPPET_CHARS: usize = 500;

/// What one campaign run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignRunSummary {
    pub campaign_id: i64,
    pub published: usize,
    pub failed: usize,
    /// Human-readable progress lines.
    pub logs: Vec<String>,
}

/// Everything a run needs once configuration checks pass.
struct Prepared {
    credential: Credential,
    keywords: Vec<String>,
    provider: ProviderConfig,
    niche: Option<String>,
}

/// Claims due campaigns and posts replies to matching threads.
pub struct CampaignEngine {
    store: Arc<dyn Store>,
    generator: Arc<dyn TextGenerator>,
    api: Arc<dyn ThreadsApi>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    processing: AtomicBool,
}

impl CampaignEngine {
    pub fn new(
        store: Arc<dyn Store>,
        generator: Arc<dyn TextGenerator>,
        api: Arc<dyn ThreadsApi>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            generator,
            api,
            clock,
            config,
            processing: AtomicBool::new(false),
        }
    }

    /// Run every campaign that is due now, one at a time.
    #[tracing::instrument(skip(self))]
    pub async fn process_due(&self) -> Vec<CampaignRunSummary> {
        let Some(_guard) = ProcessingGuard::acquire(&self.processing) else {
            debug!("campaign pass already in progress, skipping tick");
            return Vec::new();
        };

        let now = self.clock.now();
        let due = match self.store.list_due_campaigns(now).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "failed to list due campaigns");
                return Vec::new();
            }
        };

        let mut summaries = Vec::new();
        for campaign in due {
            let now = self.clock.now();
            let lease_until = now + self.config.campaign_lease;
            let claimed = match self.store.claim_campaign(campaign.id, now, lease_until).await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => continue,
                Err(e) => {
                    error!(campaign_id = campaign.id, error = %e, "failed to claim campaign");
                    continue;
                }
            };
            summaries.push(self.execute(claimed).await);
        }
        summaries
    }

    /// Run one campaign now, ahead of its schedule.
    ///
    /// Refused while the campaign is paused or another run holds it.
    pub async fn run_now(&self, id: i64) -> Result<CampaignRunSummary, EngineError> {
        let now = self.clock.now();
        let lease_until = now + self.config.campaign_lease;
        if let Some(claimed) = self.store.claim_campaign_now(id, now, lease_until).await? {
            info!(campaign_id = id, "manual campaign run");
            return Ok(self.execute(claimed).await);
        }

        let campaign = self
            .store
            .get_campaign(id)
            .await?
            .ok_or(EngineError::Store(StoreError::NotFound {
                entity: "campaign",
                id,
            }))?;
        let reason = if campaign.active {
            "is already running"
        } else {
            "is paused"
        };
        Err(EngineError::InvalidConfig(format!("campaign {} {}", id, reason)))
    }

    /// Run a claimed campaign and reschedule it, whatever happened.
    #[tracing::instrument(skip(self, campaign), fields(campaign_id = campaign.id))]
    pub async fn execute(&self, campaign: CommentCampaign) -> CampaignRunSummary {
        let mut summary = CampaignRunSummary {
            campaign_id: campaign.id,
            ..Default::default()
        };

        match self.prepare(&campaign).await {
            Ok(prepared) => self.comment(&campaign, &prepared, &mut summary).await,
            Err(e) => {
                warn!(error = %e, "campaign cannot run");
                summary.logs.push(format!("Configuration error: {}", e));
            }
        }

        self.reschedule(&campaign, summary.published).await;
        info!(
            published = summary.published,
            failed = summary.failed,
            "campaign run finished"
        );
        summary
    }

    async fn prepare(&self, campaign: &CommentCampaign) -> Result<Prepared, EngineError> {
        let account = self
            .store
            .get_account(campaign.account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(campaign.account_id))?;

        if account.is_token_expired(self.clock.now()) {
            return Err(EngineError::TokenExpired(account.username));
        }

        let (token, remote_id) = account.credential().ok_or_else(|| {
            EngineError::InvalidConfig(format!(
                "account @{} is not connected to Threads",
                account.username
            ))
        })?;
        let credential = Credential::new(token, remote_id);

        let keywords: Vec<String> = campaign.keywords().into_iter().map(String::from).collect();
        if keywords.is_empty() {
            return Err(EngineError::InvalidConfig("no target keywords".into()));
        }

        let settings = self.store.list_llm_settings(&campaign.user_id).await?;
        let provider = resolve_setting(None, None, &settings)
            .into_config()
            .ok_or_else(|| EngineError::NoProvider(campaign.user_id.clone()))?;

        // Fall back to the niche stored on the owner's utility settings row
        let niche = campaign.niche.clone().or_else(|| {
            settings
                .iter()
                .find(|s| s.is_utility())
                .and_then(|s| s.api_key.clone())
        });

        Ok(Prepared {
            credential,
            keywords,
            provider,
            niche,
        })
    }

    async fn comment(
        &self,
        campaign: &CommentCampaign,
        prepared: &Prepared,
        summary: &mut CampaignRunSummary,
    ) {
        let keyword = {
            let mut rng = rand::thread_rng();
            prepared
                .keywords
                .choose(&mut rng)
                .cloned()
                .unwrap_or_default()
        };
        summary.logs.push(format!("Searching for \"{}\"", keyword));

        let results = match self
            .api
            .search(&prepared.credential, &keyword, self.config.search_limit)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "search failed");
                summary.logs.push(format!("Search error: {}", e));
                Vec::new()
            }
        };

        if results.is_empty() {
            summary.logs.push("Search returned nothing, run finished".into());
            return;
        }

        let take = results.len().min(campaign.max_comments_per_run as usize);
        summary.logs.push(format!(
            "Found {} threads, commenting on {}",
            results.len(),
            take
        ));

        for (index, target) in results.iter().take(take).enumerate() {
            if index > 0 {
                let delay = self.draw_delay(campaign);
                summary.logs.push(format!("Waiting {}s", delay.as_secs()));
                tokio::time::sleep(delay).await;
            }

            match self.reply(campaign, prepared, target).await {
                Ok(comment) => {
                    summary.published += 1;
                    summary.logs.push(format!(
                        "Commented on \"{}...\": {}",
                        truncate_chars(&target.text, 50),
                        comment
                    ));
                }
                Err(message) => {
                    summary.failed += 1;
                    summary.logs.push(format!("Error: {}", message));
                }
            }
        }
    }

    /// Generate, publish and log one reply. Failures are logged too.
    async fn reply(
        &self,
        campaign: &CommentCampaign,
        prepared: &Prepared,
        target: &SearchResult,
    ) -> Result<String, String> {
        let request = comment_prompt(
            &campaign.comment_style,
            prepared.niche.as_deref(),
            &target.text,
            &self.config.content_language,
        );

        let mut comment = String::new();
        let result: Result<String, String> = async {
            let text = self
                .generator
                .generate(&prepared.provider, &request)
                .await
                .map_err(|e| e.to_string())?;
            comment = clean_comment(&text);
            if comment.is_empty() {
                return Err("generated comment was empty".to_string());
            }

            let container_id = self
                .api
                .create_container(&prepared.credential, &comment, Some(&target.id))
                .await
                .map_err(|e| e.to_string())?;
            self.api
                .publish_container(&prepared.credential, &container_id)
                .await
                .map_err(|e| e.to_string())
        }
        .await;

        let (status, error, remote_id) = match &result {
            Ok(remote_id) => (CommentStatus::Published, None, Some(remote_id.clone())),
            Err(message) => {
                warn!(target_id = %target.id, error = %message, "comment failed");
                (CommentStatus::Failed, Some(message.clone()), None)
            }
        };

        let log = NewCommentLog {
            campaign_id: campaign.id,
            user_id: campaign.user_id.clone(),
            target_remote_id: target.id.clone(),
            target_snippet: truncate_chars(&target.text, SNIPPET_CHARS).to_string(),
            comment_text: comment.clone(),
            status,
            error,
            remote_id,
        };
        if let Err(e) = self.store.create_comment_log(log).await {
            error!(target_id = %target.id, error = %e, "failed to record comment log");
        }

        result.map(|_| comment)
    }

    /// Uniform draw from the campaign's delay range.
    fn draw_delay(&self, campaign: &CommentCampaign) -> Duration {
        let low = campaign.min_delay_seconds.min(campaign.max_delay_seconds);
        let high = campaign.min_delay_seconds.max(campaign.max_delay_seconds);
        let secs = rand::thread_rng().gen_range(low..=high);
        Duration::from_secs(secs)
    }

    async fn reschedule(&self, campaign: &CommentCampaign, published: usize) {
        let now = self.clock.now();
        let next = now + chrono::Duration::minutes(campaign.interval_minutes as i64);

        match self
            .store
            .reschedule_campaign(campaign.id, now, next, published as u64)
            .await
        {
            Ok(true) => debug!(next_run_at = %next, "rescheduled campaign"),
            Ok(false) => debug!("campaign deleted during run"),
            Err(e) => error!(error = %e, "failed to reschedule campaign"),
        }
    }
}
