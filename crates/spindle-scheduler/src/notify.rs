//! Publish notifications.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Receives the outcome of a job run.
///
/// Calls return immediately and never fail; delivery problems stay inside
/// the notifier.
pub trait Notifier: Send + Sync {
    fn notify_success(&self, user_id: &str, post_count: usize, account_handle: &str);

    fn notify_failure(&self, user_id: &str, error_summary: &str, account_handle: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_success(&self, user_id: &str, post_count: usize, account_handle: &str) {
        info!(user_id, post_count, account = %account_handle, "publish succeeded");
    }

    fn notify_failure(&self, user_id: &str, error_summary: &str, account_handle: &str) {
        warn!(user_id, account = %account_handle, error = %error_summary, "publish failed");
    }
}

/// Kind of notification event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PublishSuccess,
    PublishFailed,
}

/// Body posted to the webhook.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub user_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: Value,
    pub timestamp: String,
}

impl NotificationEvent {
    pub fn success(user_id: &str, post_count: usize, account_handle: &str, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            event_type: EventType::PublishSuccess,
            data: json!({ "postCount": post_count, "accountUsername": account_handle }),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn failure(user_id: &str, error: &str, account_handle: &str, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            event_type: EventType::PublishFailed,
            data: json!({ "error": error, "accountUsername": account_handle }),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Posts each event as JSON to a fixed URL on a background task.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    fn dispatch(&self, event: NotificationEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(url = %self.url, "no runtime available, dropping notification");
            return;
        };

        let http = self.http.clone();
        let url = self.url.clone();
        handle.spawn(async move {
            match http.post(&url).json(&event).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(url = %url, event = ?event.event_type, "notification delivered");
                }
                Ok(response) => {
                    warn!(url = %url, status = %response.status(), "notification rejected");
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "notification delivery failed");
                }
            }
        });
    }
}

impl Notifier for WebhookNotifier {
    fn notify_success(&self, user_id: &str, post_count: usize, account_handle: &str) {
        self.dispatch(NotificationEvent::success(
            user_id,
            post_count,
            account_handle,
            Utc::now(),
        ));
    }

    fn notify_failure(&self, user_id: &str, error_summary: &str, account_handle: &str) {
        self.dispatch(NotificationEvent::failure(
            user_id,
            error_summary,
            account_handle,
            Utc::now(),
        ));
    }
}
