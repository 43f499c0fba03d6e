//! Fakes and fixtures shared by the engine tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use spindle_llm::{GenerationRequest, LlmError, ProviderConfig, TextGenerator};
use spindle_scheduler::{
    CampaignEngine, JobEngine, ManualClock, Notifier, SchedulerConfig,
};
use spindle_store::{Account, NewAccount, NewLlmSetting, SqliteStore, Store};
use spindle_threads::{ChainPublisher, Credential, SearchResult, ThreadsApi, ThreadsError};

pub fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Scripted Threads API recording every call.
#[derive(Default)]
pub struct FakeThreads {
    /// 1-based publish calls that fail.
    pub fail_publish: HashSet<usize>,
    pub search_results: Vec<SearchResult>,
    pub search_fails: bool,
    /// (text, reply_to) per container creation.
    pub creates: Mutex<Vec<(String, Option<String>)>>,
    pub publishes: Mutex<usize>,
    pub searches: Mutex<Vec<String>>,
}

impl FakeThreads {
    pub fn creates(&self) -> Vec<(String, Option<String>)> {
        self.creates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ThreadsApi for FakeThreads {
    async fn create_container(
        &self,
        _credential: &Credential,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<String, ThreadsError> {
        let mut creates = self.creates.lock().unwrap();
        creates.push((text.to_string(), reply_to.map(String::from)));
        Ok(format!("c{}", creates.len()))
    }

    async fn publish_container(
        &self,
        _credential: &Credential,
        container_id: &str,
    ) -> Result<String, ThreadsError> {
        let mut publishes = self.publishes.lock().unwrap();
        *publishes += 1;
        if self.fail_publish.contains(&*publishes) {
            return Err(ThreadsError::Api {
                message: "publish rejected".into(),
            });
        }
        Ok(container_id.replacen('c', "m", 1))
    }

    async fn search(
        &self,
        _credential: &Credential,
        keyword: &str,
        _limit: u32,
    ) -> Result<Vec<SearchResult>, ThreadsError> {
        self.searches.lock().unwrap().push(keyword.to_string());
        if self.search_fails {
            return Err(ThreadsError::Api {
                message: "search unavailable".into(),
            });
        }
        Ok(self.search_results.clone())
    }
}

/// Generator replaying queued responses, then a fixed fallback.
pub struct FakeGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    pub calls: Mutex<Vec<(ProviderConfig, GenerationRequest)>>,
    /// When set, every call waits for a permit.
    pub gate: Option<Arc<Notify>>,
    pub entered: Arc<Notify>,
}

impl FakeGenerator {
    pub fn returning(text: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: text.to_string(),
            calls: Mutex::new(Vec::new()),
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn then(self, response: Result<&str, &str>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(response.map(String::from).map_err(String::from));
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<(ProviderConfig, GenerationRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(
        &self,
        config: &ProviderConfig,
        request: &GenerationRequest,
    ) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((config.clone(), request.clone()));
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::Api {
                status: 500,
                message,
            }),
            None => Ok(self.fallback.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Success { user_id: String, count: usize, handle: String },
    Failure { user_id: String, error: String, handle: String },
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_success(&self, user_id: &str, post_count: usize, account_handle: &str) {
        self.sent.lock().unwrap().push(Sent::Success {
            user_id: user_id.into(),
            count: post_count,
            handle: account_handle.into(),
        });
    }

    fn notify_failure(&self, user_id: &str, error_summary: &str, account_handle: &str) {
        self.sent.lock().unwrap().push(Sent::Failure {
            user_id: user_id.into(),
            error: error_summary.into(),
            handle: account_handle.into(),
        });
    }
}

/// Store, clock and fakes wired together.
pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub clock: Arc<ManualClock>,
    pub threads: Arc<FakeThreads>,
    pub generator: Arc<FakeGenerator>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: SchedulerConfig,
}

impl Harness {
    pub fn new(threads: FakeThreads, generator: FakeGenerator) -> Self {
        Self::with_store(
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            threads,
            generator,
        )
    }

    pub fn with_store(store: Arc<SqliteStore>, threads: FakeThreads, generator: FakeGenerator) -> Self {
        Self {
            store,
            clock: Arc::new(ManualClock::new(start_time())),
            threads: Arc::new(threads),
            generator: Arc::new(generator),
            notifier: Arc::new(RecordingNotifier::default()),
            config: SchedulerConfig::default(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use spindle_scheduler::Clock;
        self.clock.now()
    }

    pub fn job_engine(&self) -> JobEngine {
        JobEngine::new(
            self.store.clone(),
            self.generator.clone(),
            ChainPublisher::new(self.threads.clone()).with_post_delay(Duration::ZERO),
            self.notifier.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    pub fn campaign_engine(&self) -> CampaignEngine {
        CampaignEngine::new(
            self.store.clone(),
            self.generator.clone(),
            self.threads.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    /// An account that can publish.
    pub async fn connected_account(&self) -> Account {
        self.store
            .create_account(NewAccount {
                user_id: "u1".into(),
                username: "alice".into(),
                access_token: Some("token".into()),
                threads_user_id: Some("1001".into()),
                token_expires_at: Some(self.now() + chrono::Duration::days(30)),
            })
            .await
            .unwrap()
    }

    /// An account saved before it was connected to Threads.
    pub async fn draft_account(&self) -> Account {
        self.store
            .create_account(NewAccount {
                user_id: "u1".into(),
                username: "bob".into(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn default_llm(&self) {
        self.store
            .create_llm_setting(NewLlmSetting {
                user_id: "u1".into(),
                provider: "openrouter".into(),
                model_id: "meta-llama/llama-3.3-70b-instruct".into(),
                api_key: Some("sk-or".into()),
                is_default: true,
                is_active: true,
                ..Default::default()
            })
            .await
            .unwrap();
    }
}
