//! OpenAI-compatible chat client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{LlmError, ProviderConfig};

/// One prompt to send to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    /// Ask for a JSON object response where the provider supports it.
    pub json_mode: bool,
}

/// Turns a prompt into text using a configured model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        config: &ProviderConfig,
        request: &GenerationRequest,
    ) -> Result<String, LlmError>;
}

/// [`TextGenerator`] speaking the `/chat/completions` protocol.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ChatClient {
    pub fn new() -> Result<Self, LlmError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    #[tracing::instrument(skip(self, config, request), fields(provider = %config.provider, model = %config.model_id))]
    async fn generate(
        &self,
        config: &ProviderConfig,
        request: &GenerationRequest,
    ) -> Result<String, LlmError> {
        let provider = config.provider()?;
        let endpoint = config.endpoint()?;
        let key = config.bearer()?;

        let body = ChatBody {
            model: &config.model_id,
            messages: [
                Message {
                    role: "system",
                    content: &request.system_prompt,
                },
                Message {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: request.max_tokens,
            response_format: (request.json_mode && provider.supports_json_mode()).then_some(
                ResponseFormat {
                    kind: "json_object",
                },
            ),
        };

        let mut req = self
            .http
            .post(format!("{}/chat/completions", endpoint))
            .json(&body);
        if let Some(key) = key {
            req = req.bearer_auth(key);
        }

        let start = std::time::Instant::now();
        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            warn!(status = %status, error = %message, "chat completion failed");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&response.text().await?)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            response_len = content.len(),
            "chat completion"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn request(json_mode: bool) -> GenerationRequest {
        GenerationRequest {
            system_prompt: "be brief".into(),
            user_prompt: "say hi".into(),
            max_tokens: 150,
            json_mode,
        }
    }

    fn custom(server: &MockServer) -> ProviderConfig {
        ProviderConfig {
            provider: "custom".into(),
            model_id: "tiny".into(),
            api_key: Some("sk-test".into()),
            base_url: Some(format!("{}/v1/", server.uri())),
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
    }

    #[tokio::test]
    async fn test_generate_sends_messages_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "tiny",
                "max_tokens": 150,
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "say hi" }
                ],
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("hi")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new().unwrap();
        let text = client.generate(&custom(&server), &request(true)).await.unwrap();
        assert_eq!(text, "hi");
    }

    #[tokio::test]
    async fn test_json_mode_omitted_for_ollama() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            provider: "ollama".into(),
            model_id: "llama3.3".into(),
            api_key: None,
            base_url: Some(format!("{}/v1", server.uri())),
        };
        let client = ChatClient::new().unwrap();
        client.generate(&config, &request(true)).await.unwrap();

        let received: Vec<Request> = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(body.get("response_format").is_none());
        assert!(received[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_error_body_message_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "invalid api key" }
            })))
            .mount(&server)
            .await;

        let client = ChatClient::new().unwrap();
        let err = client
            .generate(&custom(&server), &request(false))
            .await
            .unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = ChatClient::new().unwrap();
        let err = client
            .generate(&custom(&server), &request(false))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let server = MockServer::start().await;
        let config = ProviderConfig::new("openrouter", "meta-llama/llama-3.3-70b-instruct");

        let client = ChatClient::new().unwrap();
        let err = client.generate(&config, &request(false)).await.unwrap_err();
        assert!(matches!(err, LlmError::Config(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
