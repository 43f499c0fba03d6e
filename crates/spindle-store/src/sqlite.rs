//! SQLite implementation of the store.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info, warn};

use crate::types::*;
use crate::{Store, StoreError};

/// `last_error` written on jobs whose run outlived its lease.
pub const INTERRUPTED_ERROR: &str = "interrupted: run did not finish before the lease expired";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        username TEXT NOT NULL,
        access_token TEXT,
        threads_user_id TEXT,
        token_expires_at TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS templates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        style TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS scheduled_jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        template_id INTEGER REFERENCES templates(id) ON DELETE SET NULL,
        topic TEXT,
        style TEXT,
        branches INTEGER NOT NULL DEFAULT 5,
        provider TEXT,
        model_id TEXT,
        recurrence TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        scheduled_at TEXT,
        next_run_at TEXT,
        last_run_at TEXT,
        last_error TEXT,
        run_count INTEGER NOT NULL DEFAULT 0,
        claimed_at TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_jobs_status_next ON scheduled_jobs(status, next_run_at);

    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        template_id INTEGER REFERENCES templates(id) ON DELETE SET NULL,
        job_id INTEGER REFERENCES scheduled_jobs(id) ON DELETE SET NULL,
        content TEXT NOT NULL,
        thread_position INTEGER NOT NULL,
        remote_id TEXT,
        parent_remote_id TEXT,
        status TEXT NOT NULL,
        published_at TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_posts_job ON posts(job_id);

    CREATE TABLE IF NOT EXISTS llm_settings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        provider TEXT NOT NULL,
        model_id TEXT NOT NULL,
        api_key TEXT,
        base_url TEXT,
        is_default INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_llm_settings_user ON llm_settings(user_id);

    CREATE TABLE IF NOT EXISTS comment_campaigns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        target_keywords TEXT NOT NULL,
        comment_style TEXT NOT NULL DEFAULT 'helpful',
        niche TEXT,
        max_comments_per_run INTEGER NOT NULL DEFAULT 5,
        min_delay_seconds INTEGER NOT NULL DEFAULT 60,
        max_delay_seconds INTEGER NOT NULL DEFAULT 300,
        interval_minutes INTEGER NOT NULL DEFAULT 60,
        active INTEGER NOT NULL DEFAULT 1,
        last_run_at TEXT,
        next_run_at TEXT,
        total_comments INTEGER NOT NULL DEFAULT 0,
        claimed_at TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_campaigns_active_next ON comment_campaigns(active, next_run_at);

    CREATE TABLE IF NOT EXISTS comment_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        campaign_id INTEGER NOT NULL REFERENCES comment_campaigns(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        target_remote_id TEXT NOT NULL,
        target_snippet TEXT NOT NULL,
        comment_text TEXT NOT NULL,
        status TEXT NOT NULL,
        error TEXT,
        remote_id TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_comment_logs_campaign ON comment_logs(campaign_id);
";

const ACCOUNT_COLUMNS: &str =
    "id, user_id, username, access_token, threads_user_id, token_expires_at, created_at";

const TEMPLATE_COLUMNS: &str = "id, user_id, title, content, style, created_at";

const JOB_COLUMNS: &str = "id, user_id, account_id, template_id, topic, style, branches, \
     provider, model_id, recurrence, status, scheduled_at, next_run_at, last_run_at, \
     last_error, run_count, claimed_at, created_at";

const POST_COLUMNS: &str = "id, user_id, account_id, template_id, job_id, content, \
     thread_position, remote_id, parent_remote_id, status, published_at, created_at";

const SETTING_COLUMNS: &str =
    "id, user_id, provider, model_id, api_key, base_url, is_default, is_active, created_at";

const CAMPAIGN_COLUMNS: &str = "id, user_id, account_id, target_keywords, comment_style, \
     niche, max_comments_per_run, min_delay_seconds, max_delay_seconds, interval_minutes, \
     active, last_run_at, next_run_at, total_comments, claimed_at, created_at";

const LOG_COLUMNS: &str = "id, campaign_id, user_id, target_remote_id, target_snippet, \
     comment_text, status, error, remote_id, created_at";

// Effective run time is next_run_at, falling back to scheduled_at. ?1 is `now`.
const JOB_DUE: &str = "status IN ('pending', 'recurring') AND (
        (next_run_at IS NOT NULL AND next_run_at <= ?1)
        OR (next_run_at IS NULL AND scheduled_at IS NOT NULL AND scheduled_at <= ?1)
    )";

/// SQLite-backed [`Store`].
///
/// Timestamps are stored as fixed-width RFC 3339 UTC text so that string
/// comparison in SQL matches chronological order.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;

        // WAL lets the CLI read while the daemon writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::init(conn)?;
        info!(path = %path.display(), "database initialized");
        Ok(store)
    }

    /// A private database that lives as long as the returned store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Lock)
    }
}

#[async_trait]
impl Store for SqliteStore {
    // =========================================================================
    // Jobs
    // =========================================================================

    async fn list_due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM scheduled_jobs
             WHERE {JOB_DUE}
             ORDER BY COALESCE(next_run_at, scheduled_at), id"
        ))?;
        let jobs = stmt
            .query_map(params![ts(now)], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    async fn claim_job(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledJob>, StoreError> {
        let conn = self.conn()?;
        let claimed = conn
            .query_row(
                &format!(
                    "UPDATE scheduled_jobs SET status = 'running', claimed_at = ?1
                     WHERE id = ?2 AND {JOB_DUE}
                     RETURNING {JOB_COLUMNS}"
                ),
                params![ts(now), id],
                job_from_row,
            )
            .optional()?;

        if claimed.is_none() {
            debug!(job_id = id, "job claim lost");
        }
        Ok(claimed)
    }

    async fn get_job(&self, id: i64) -> Result<Option<ScheduledJob>, StoreError> {
        let conn = self.conn()?;
        let job = conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM scheduled_jobs WHERE id = ?1"),
                params![id],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    async fn list_jobs(&self, user_id: Option<&str>) -> Result<Vec<ScheduledJob>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM scheduled_jobs
             WHERE ?1 IS NULL OR user_id = ?1
             ORDER BY id"
        ))?;
        let jobs = stmt
            .query_map(params![user_id], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    async fn create_job(&self, job: NewJob) -> Result<ScheduledJob, StoreError> {
        let branches = job.branches.unwrap_or(DEFAULT_BRANCHES);
        if branches == 0 {
            return Err(StoreError::Invalid("branches: must be at least 1".into()));
        }

        let now = Utc::now();
        let (status, next_run_at) = if job.recurrence.is_some() {
            (JobStatus::Recurring, Some(job.scheduled_at.unwrap_or(now)))
        } else {
            (JobStatus::Pending, None)
        };

        let conn = self.conn()?;
        let created = conn.query_row(
            &format!(
                "INSERT INTO scheduled_jobs
                 (user_id, account_id, template_id, topic, style, branches, provider, model_id,
                  recurrence, status, scheduled_at, next_run_at, run_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13)
                 RETURNING {JOB_COLUMNS}"
            ),
            params![
                job.user_id,
                job.account_id,
                job.template_id,
                job.topic,
                job.style,
                branches,
                job.provider,
                job.model_id,
                job.recurrence,
                status.as_str(),
                opt_ts(job.scheduled_at),
                opt_ts(next_run_at),
                ts(now),
            ],
            job_from_row,
        )?;
        Ok(created)
    }

    async fn finish_job(
        &self,
        job: &ScheduledJob,
        claimed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE scheduled_jobs SET
                status = ?2, next_run_at = ?3, last_run_at = ?4, last_error = ?5,
                run_count = ?6, claimed_at = NULL
             WHERE id = ?1 AND status = 'running' AND claimed_at IS ?7",
            params![
                job.id,
                job.status.as_str(),
                opt_ts(job.next_run_at),
                opt_ts(job.last_run_at),
                job.last_error,
                job.run_count,
                opt_ts(claimed_at),
            ],
        )?;
        if changed == 0 {
            warn!(job_id = job.id, "claim no longer held, run result dropped");
        }
        Ok(changed > 0)
    }

    async fn pause_job(&self, id: i64) -> Result<Option<ScheduledJob>, StoreError> {
        let conn = self.conn()?;
        let paused = conn
            .query_row(
                &format!(
                    "UPDATE scheduled_jobs SET status = 'paused'
                     WHERE id = ?1 AND status IN ('pending', 'recurring')
                     RETURNING {JOB_COLUMNS}"
                ),
                params![id],
                job_from_row,
            )
            .optional()?;
        Ok(paused)
    }

    async fn release_job(
        &self,
        id: i64,
        from: &[JobStatus],
        next_run_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledJob>, StoreError> {
        if from.is_empty() {
            return Ok(None);
        }
        let from = from
            .iter()
            .map(|status| format!("'{}'", status.as_str()))
            .collect::<Vec<_>>()
            .join(", ");

        let conn = self.conn()?;
        let released = conn
            .query_row(
                &format!(
                    "UPDATE scheduled_jobs SET
                        status = CASE WHEN recurrence IS NULL THEN 'pending' ELSE 'recurring' END,
                        next_run_at = ?2,
                        claimed_at = NULL
                     WHERE id = ?1 AND status IN ({from})
                     RETURNING {JOB_COLUMNS}"
                ),
                params![id, ts(next_run_at)],
                job_from_row,
            )
            .optional()?;
        Ok(released)
    }

    async fn delete_job(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM scheduled_jobs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    async fn reclaim_stale_jobs(&self, cutoff: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "UPDATE scheduled_jobs SET
                status = CASE WHEN recurrence IS NULL THEN 'pending' ELSE 'recurring' END,
                claimed_at = NULL,
                last_error = ?2
             WHERE status = 'running' AND claimed_at IS NOT NULL AND claimed_at < ?1
             RETURNING id",
        )?;
        let ids = stmt
            .query_map(params![ts(cutoff), INTERRUPTED_ERROR], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        if !ids.is_empty() {
            warn!(count = ids.len(), job_ids = ?ids, "reclaimed jobs with expired leases");
        }
        Ok(ids)
    }

    // =========================================================================
    // Campaigns
    // =========================================================================

    async fn list_due_campaigns(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CommentCampaign>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM comment_campaigns
             WHERE active = 1 AND (next_run_at IS NULL OR next_run_at <= ?1)
             ORDER BY COALESCE(next_run_at, created_at), id"
        ))?;
        let campaigns = stmt
            .query_map(params![ts(now)], campaign_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(campaigns)
    }

    async fn claim_campaign(
        &self,
        id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<CommentCampaign>, StoreError> {
        let conn = self.conn()?;
        let claimed = conn
            .query_row(
                &format!(
                    "UPDATE comment_campaigns SET next_run_at = ?3, claimed_at = ?2
                     WHERE id = ?1 AND active = 1 AND (next_run_at IS NULL OR next_run_at <= ?2)
                     RETURNING {CAMPAIGN_COLUMNS}"
                ),
                params![id, ts(now), ts(lease_until)],
                campaign_from_row,
            )
            .optional()?;

        if claimed.is_none() {
            debug!(campaign_id = id, "campaign claim lost");
        }
        Ok(claimed)
    }

    async fn claim_campaign_now(
        &self,
        id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<CommentCampaign>, StoreError> {
        let conn = self.conn()?;
        // A live claim keeps next_run_at at its lease end until the run reschedules
        let claimed = conn
            .query_row(
                &format!(
                    "UPDATE comment_campaigns SET next_run_at = ?3, claimed_at = ?2
                     WHERE id = ?1 AND active = 1
                       AND (claimed_at IS NULL OR next_run_at IS NULL OR next_run_at <= ?2)
                     RETURNING {CAMPAIGN_COLUMNS}"
                ),
                params![id, ts(now), ts(lease_until)],
                campaign_from_row,
            )
            .optional()?;

        if claimed.is_none() {
            debug!(campaign_id = id, "manual campaign claim refused");
        }
        Ok(claimed)
    }

    async fn get_campaign(&self, id: i64) -> Result<Option<CommentCampaign>, StoreError> {
        let conn = self.conn()?;
        let campaign = conn
            .query_row(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM comment_campaigns WHERE id = ?1"),
                params![id],
                campaign_from_row,
            )
            .optional()?;
        Ok(campaign)
    }

    async fn list_campaigns(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<CommentCampaign>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM comment_campaigns
             WHERE ?1 IS NULL OR user_id = ?1
             ORDER BY id"
        ))?;
        let campaigns = stmt
            .query_map(params![user_id], campaign_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(campaigns)
    }

    async fn create_campaign(&self, campaign: NewCampaign) -> Result<CommentCampaign, StoreError> {
        campaign.validate()?;

        let conn = self.conn()?;
        let created = conn.query_row(
            &format!(
                "INSERT INTO comment_campaigns
                 (user_id, account_id, target_keywords, comment_style, niche, max_comments_per_run,
                  min_delay_seconds, max_delay_seconds, interval_minutes, active, total_comments,
                  created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, 0, ?10)
                 RETURNING {CAMPAIGN_COLUMNS}"
            ),
            params![
                campaign.user_id,
                campaign.account_id,
                campaign.target_keywords,
                campaign.comment_style,
                campaign.niche,
                campaign.max_comments_per_run,
                campaign.min_delay_seconds as i64,
                campaign.max_delay_seconds as i64,
                campaign.interval_minutes,
                ts(Utc::now()),
            ],
            campaign_from_row,
        )?;
        Ok(created)
    }

    async fn set_campaign_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Option<CommentCampaign>, StoreError> {
        let conn = self.conn()?;
        let updated = conn
            .query_row(
                &format!(
                    "UPDATE comment_campaigns SET active = ?2 WHERE id = ?1
                     RETURNING {CAMPAIGN_COLUMNS}"
                ),
                params![id, active],
                campaign_from_row,
            )
            .optional()?;
        Ok(updated)
    }

    async fn reschedule_campaign(
        &self,
        id: i64,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
        published: u64,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE comment_campaigns SET
                last_run_at = ?2, next_run_at = ?3, total_comments = total_comments + ?4,
                claimed_at = NULL
             WHERE id = ?1",
            params![id, ts(last_run_at), ts(next_run_at), published as i64],
        )?;
        Ok(changed > 0)
    }

    async fn delete_campaign(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM comment_campaigns WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    // =========================================================================
    // Accounts and templates
    // =========================================================================

    async fn get_account(&self, id: i64) -> Result<Option<Account>, StoreError> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let conn = self.conn()?;
        let created = conn.query_row(
            &format!(
                "INSERT INTO accounts
                 (user_id, username, access_token, threads_user_id, token_expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING {ACCOUNT_COLUMNS}"
            ),
            params![
                account.user_id,
                account.username,
                account.access_token,
                account.threads_user_id,
                opt_ts(account.token_expires_at),
                ts(Utc::now()),
            ],
            account_from_row,
        )?;
        Ok(created)
    }

    async fn get_template(&self, id: i64) -> Result<Option<Template>, StoreError> {
        let conn = self.conn()?;
        let template = conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1"),
                params![id],
                template_from_row,
            )
            .optional()?;
        Ok(template)
    }

    async fn create_template(&self, template: NewTemplate) -> Result<Template, StoreError> {
        let conn = self.conn()?;
        let created = conn.query_row(
            &format!(
                "INSERT INTO templates (user_id, title, content, style, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING {TEMPLATE_COLUMNS}"
            ),
            params![
                template.user_id,
                template.title,
                template.content,
                template.style,
                ts(Utc::now()),
            ],
            template_from_row,
        )?;
        Ok(created)
    }

    // =========================================================================
    // Posts and comment logs
    // =========================================================================

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let conn = self.conn()?;
        let created = conn.query_row(
            &format!(
                "INSERT INTO posts
                 (user_id, account_id, template_id, job_id, content, thread_position, remote_id,
                  parent_remote_id, status, published_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 RETURNING {POST_COLUMNS}"
            ),
            params![
                post.user_id,
                post.account_id,
                post.template_id,
                post.job_id,
                post.content,
                post.thread_position,
                post.remote_id,
                post.parent_remote_id,
                post.status.as_str(),
                opt_ts(post.published_at),
                ts(Utc::now()),
            ],
            post_from_row,
        )?;
        Ok(created)
    }

    async fn list_posts_for_job(&self, job_id: i64) -> Result<Vec<Post>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE job_id = ?1 ORDER BY thread_position, id"
        ))?;
        let posts = stmt
            .query_map(params![job_id], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn create_comment_log(&self, log: NewCommentLog) -> Result<CommentLog, StoreError> {
        let conn = self.conn()?;
        let created = conn.query_row(
            &format!(
                "INSERT INTO comment_logs
                 (campaign_id, user_id, target_remote_id, target_snippet, comment_text, status,
                  error, remote_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 RETURNING {LOG_COLUMNS}"
            ),
            params![
                log.campaign_id,
                log.user_id,
                log.target_remote_id,
                log.target_snippet,
                log.comment_text,
                log.status.as_str(),
                log.error,
                log.remote_id,
                ts(Utc::now()),
            ],
            log_from_row,
        )?;
        Ok(created)
    }

    async fn list_comment_logs(&self, campaign_id: i64) -> Result<Vec<CommentLog>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM comment_logs WHERE campaign_id = ?1 ORDER BY id"
        ))?;
        let logs = stmt
            .query_map(params![campaign_id], log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    // =========================================================================
    // LLM settings
    // =========================================================================

    async fn list_llm_settings(&self, user_id: &str) -> Result<Vec<LlmSetting>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SETTING_COLUMNS} FROM llm_settings
             WHERE user_id = ?1
             ORDER BY is_default DESC, created_at, id"
        ))?;
        let settings = stmt
            .query_map(params![user_id], setting_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(settings)
    }

    async fn create_llm_setting(&self, setting: NewLlmSetting) -> Result<LlmSetting, StoreError> {
        let conn = self.conn()?;
        let created = conn.query_row(
            &format!(
                "INSERT INTO llm_settings
                 (user_id, provider, model_id, api_key, base_url, is_default, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 RETURNING {SETTING_COLUMNS}"
            ),
            params![
                setting.user_id,
                setting.provider,
                setting.model_id,
                setting.api_key,
                setting.base_url,
                setting.is_default,
                setting.is_active,
                ts(Utc::now()),
            ],
            setting_from_row,
        )?;
        Ok(created)
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_ts(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(ts)
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_ts(&text, idx)
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse_ts(&t, idx)).transpose()
}

fn parse_ts(text: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = StoreError>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        access_token: row.get(3)?,
        threads_user_id: row.get(4)?,
        token_expires_at: get_opt_ts(row, 5)?,
        created_at: get_ts(row, 6)?,
    })
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<Template> {
    Ok(Template {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        style: row.get(4)?,
        created_at: get_ts(row, 5)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduledJob> {
    Ok(ScheduledJob {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_id: row.get(2)?,
        template_id: row.get(3)?,
        topic: row.get(4)?,
        style: row.get(5)?,
        branches: row.get(6)?,
        provider: row.get(7)?,
        model_id: row.get(8)?,
        recurrence: row.get(9)?,
        status: get_enum(row, 10)?,
        scheduled_at: get_opt_ts(row, 11)?,
        next_run_at: get_opt_ts(row, 12)?,
        last_run_at: get_opt_ts(row, 13)?,
        last_error: row.get(14)?,
        run_count: row.get(15)?,
        claimed_at: get_opt_ts(row, 16)?,
        created_at: get_ts(row, 17)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_id: row.get(2)?,
        template_id: row.get(3)?,
        job_id: row.get(4)?,
        content: row.get(5)?,
        thread_position: row.get(6)?,
        remote_id: row.get(7)?,
        parent_remote_id: row.get(8)?,
        status: get_enum(row, 9)?,
        published_at: get_opt_ts(row, 10)?,
        created_at: get_ts(row, 11)?,
    })
}

fn setting_from_row(row: &Row<'_>) -> rusqlite::Result<LlmSetting> {
    Ok(LlmSetting {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider: row.get(2)?,
        model_id: row.get(3)?,
        api_key: row.get(4)?,
        base_url: row.get(5)?,
        is_default: row.get(6)?,
        is_active: row.get(7)?,
        created_at: get_ts(row, 8)?,
    })
}

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<CommentCampaign> {
    Ok(CommentCampaign {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_id: row.get(2)?,
        target_keywords: row.get(3)?,
        comment_style: row.get(4)?,
        niche: row.get(5)?,
        max_comments_per_run: row.get(6)?,
        min_delay_seconds: row.get::<_, i64>(7)?.max(0) as u64,
        max_delay_seconds: row.get::<_, i64>(8)?.max(0) as u64,
        interval_minutes: row.get(9)?,
        active: row.get(10)?,
        last_run_at: get_opt_ts(row, 11)?,
        next_run_at: get_opt_ts(row, 12)?,
        total_comments: row.get::<_, i64>(13)?.max(0) as u64,
        claimed_at: get_opt_ts(row, 14)?,
        created_at: get_ts(row, 15)?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<CommentLog> {
    Ok(CommentLog {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        user_id: row.get(2)?,
        target_remote_id: row.get(3)?,
        target_snippet: row.get(4)?,
        comment_text: row.get(5)?,
        status: get_enum(row, 6)?,
        error: row.get(7)?,
        remote_id: row.get(8)?,
        created_at: get_ts(row, 9)?,
    })
}
