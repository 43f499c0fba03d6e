//! Threads Graph API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{GraphError, IdResponse, SearchResponse};
use crate::{Credential, SearchResult, ThreadsError};

/// Production Graph API base URL.
pub const DEFAULT_API_URL: &str = "https://graph.threads.net/v1.0";

/// The remote calls Spindle makes against the Threads platform.
#[async_trait]
pub trait ThreadsApi: Send + Sync {
    /// Create an unpublished text container, optionally replying to `reply_to`.
    ///
    /// Returns the container id.
    async fn create_container(
        &self,
        credential: &Credential,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<String, ThreadsError>;

    /// Publish a previously created container.
    ///
    /// Returns the id of the published post.
    async fn publish_container(
        &self,
        credential: &Credential,
        container_id: &str,
    ) -> Result<String, ThreadsError>;

    /// Search public posts by keyword.
    async fn search(
        &self,
        credential: &Credential,
        keyword: &str,
        limit: u32,
    ) -> Result<Vec<SearchResult>, ThreadsError>;
}

/// HTTP client for the Threads Graph API.
pub struct ThreadsClient {
    http: Client,
    api_url: String,
}

impl ThreadsClient {
    /// Create a new client for the given API base URL.
    pub fn new(api_url: impl Into<String>) -> Result<Self, ThreadsError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the API base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ThreadsError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(ThreadsError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let text = response.text().await.map_err(|e| {
                ThreadsError::InvalidResponse(format!(
                    "request failed ({}): failed to read response: {}",
                    status, e
                ))
            })?;

            // Graph API errors look like {"error": {"message": "..."}}
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&text)
                && let Some(message) = envelope.error.message
            {
                return Err(ThreadsError::Api { message });
            }

            return Err(ThreadsError::InvalidResponse(format!(
                "request failed ({}): {}",
                status, text
            )));
        }

        let body = response.json().await?;
        Ok(body)
    }
}

/// Error-only body of a failed Graph API request.
#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: GraphError,
}

fn api_error(error: GraphError, fallback: &str) -> ThreadsError {
    ThreadsError::Api {
        message: error.message.unwrap_or_else(|| fallback.to_string()),
    }
}

#[async_trait]
impl ThreadsApi for ThreadsClient {
    async fn create_container(
        &self,
        credential: &Credential,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<String, ThreadsError> {
        #[derive(Serialize)]
        struct CreateRequest<'a> {
            text: &'a str,
            media_type: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            reply_to_id: Option<&'a str>,
            access_token: &'a str,
        }

        let url = format!("{}/{}/threads", self.api_url, credential.user_id);

        let response = self
            .http
            .post(&url)
            .json(&CreateRequest {
                text,
                media_type: "TEXT",
                reply_to_id: reply_to,
                access_token: &credential.access_token,
            })
            .send()
            .await?;

        let body: IdResponse = self.handle_response(response).await?;
        if let Some(error) = body.error {
            return Err(api_error(error, "container creation failed"));
        }

        let id = body
            .id
            .ok_or_else(|| ThreadsError::InvalidResponse("no container id returned".into()))?;
        debug!(container_id = %id, reply_to = ?reply_to, "created threads container");
        Ok(id)
    }

    async fn publish_container(
        &self,
        credential: &Credential,
        container_id: &str,
    ) -> Result<String, ThreadsError> {
        #[derive(Serialize)]
        struct PublishRequest<'a> {
            creation_id: &'a str,
            access_token: &'a str,
        }

        let url = format!("{}/{}/threads_publish", self.api_url, credential.user_id);

        let response = self
            .http
            .post(&url)
            .json(&PublishRequest {
                creation_id: container_id,
                access_token: &credential.access_token,
            })
            .send()
            .await?;

        let body: IdResponse = self.handle_response(response).await?;
        if let Some(error) = body.error {
            return Err(api_error(error, "publish failed"));
        }

        // Some API versions acknowledge the publish without echoing a media id;
        // the container id then identifies the post.
        let id = body.id.unwrap_or_else(|| container_id.to_string());
        debug!(media_id = %id, "published threads container");
        Ok(id)
    }

    async fn search(
        &self,
        credential: &Credential,
        keyword: &str,
        limit: u32,
    ) -> Result<Vec<SearchResult>, ThreadsError> {
        let url = format!("{}/threads/search", self.api_url);
        let limit = limit.to_string();

        // Retry up to 3 times: initial + 2 retries with backoff
        let mut attempt = 0;
        let body: SearchResponse = loop {
            let response = self
                .http
                .get(&url)
                .query(&[
                    ("q", keyword),
                    ("fields", "id,text,username"),
                    ("access_token", credential.access_token.as_str()),
                    ("limit", limit.as_str()),
                ])
                .send()
                .await
                .map_err(ThreadsError::from);

            let result = match response {
                Ok(response) => self.handle_response(response).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(body) => break body,
                Err(e) if e.is_transient() && attempt < 2 => {
                    let backoff_ms = 500 * (1 << attempt); // 500ms, 1s
                    warn!(
                        attempt = attempt + 1,
                        backoff_ms,
                        error = %e,
                        "transient error in search, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(error) = body.error {
            return Err(api_error(error, "search failed"));
        }

        let results: Vec<SearchResult> = body
            .data
            .into_iter()
            .filter_map(|item| match (item.id, item.text) {
                (Some(id), Some(text)) if !id.is_empty() && !text.is_empty() => {
                    Some(SearchResult {
                        id,
                        text,
                        username: item.username,
                    })
                }
                _ => None,
            })
            .collect();

        debug!(keyword, count = results.len(), "threads search finished");
        Ok(results)
    }
}
