//! Known chat providers and their endpoints.

use std::fmt;
use std::str::FromStr;

use spindle_store::LlmSetting;

use crate::LlmError;

const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434/v1";

/// A chat-completions provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenRouter,
    Groq,
    OpenAi,
    Anthropic,
    Google,
    Xai,
    /// Local server, no key needed.
    Ollama,
    /// Any OpenAI-compatible endpoint; needs a base URL.
    Custom,
}

impl Provider {
    pub const ALL: [Provider; 8] = [
        Provider::OpenRouter,
        Provider::Groq,
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Google,
        Provider::Xai,
        Provider::Ollama,
        Provider::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "openrouter",
            Provider::Groq => "groq",
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Xai => "xai",
            Provider::Ollama => "ollama",
            Provider::Custom => "custom",
        }
    }

    fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Provider::Groq => Some("https://api.groq.com/openai/v1"),
            Provider::OpenAi => Some("https://api.openai.com/v1"),
            Provider::Anthropic => Some("https://api.anthropic.com/v1"),
            Provider::Google => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            Provider::Xai => Some("https://api.x.ai/v1"),
            Provider::Ollama => Some(OLLAMA_DEFAULT_URL),
            Provider::Custom => None,
        }
    }

    /// Whether requests without an API key are rejected up front.
    pub fn requires_key(&self) -> bool {
        !matches!(self, Provider::Ollama | Provider::Custom)
    }

    /// Whether the provider accepts `response_format: json_object`.
    pub fn supports_json_mode(&self) -> bool {
        !matches!(self, Provider::Anthropic | Provider::Ollama | Provider::Groq)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openrouter" => Ok(Provider::OpenRouter),
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "google" => Ok(Provider::Google),
            "xai" => Ok(Provider::Xai),
            "ollama" => Ok(Provider::Ollama),
            "custom" => Ok(Provider::Custom),
            other => Err(LlmError::Config(format!("unknown provider '{}'", other))),
        }
    }
}

/// Everything needed to call one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: String,
    pub model_id: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            api_key: None,
            base_url: None,
        }
    }

    /// The known provider this config names.
    pub fn provider(&self) -> Result<Provider, LlmError> {
        self.provider.parse()
    }

    /// Chat endpoint root, without a trailing slash.
    ///
    /// A stored base URL overrides the default for Ollama and is required for
    /// custom providers; hosted providers always use their public endpoint.
    pub fn endpoint(&self) -> Result<String, LlmError> {
        let provider = self.provider()?;
        let configured = self.base_url.as_deref().filter(|u| !u.trim().is_empty());

        let base = match (provider, configured) {
            (Provider::Ollama | Provider::Custom, Some(url)) => url,
            (Provider::Custom, None) => {
                return Err(LlmError::Config(
                    "custom provider requires a base URL".into(),
                ));
            }
            (other, _) => other.default_base_url().unwrap_or(OLLAMA_DEFAULT_URL),
        };
        Ok(base.trim_end_matches('/').to_string())
    }

    /// Key to send as a bearer token, rejecting keyed providers without one.
    pub fn bearer(&self) -> Result<Option<&str>, LlmError> {
        let provider = self.provider()?;
        let key = self.api_key.as_deref().filter(|k| !k.is_empty());
        if key.is_none() && provider.requires_key() {
            return Err(LlmError::Config(format!(
                "no API key configured for {}",
                provider
            )));
        }
        Ok(key)
    }
}

impl From<&LlmSetting> for ProviderConfig {
    fn from(setting: &LlmSetting) -> Self {
        Self {
            provider: setting.provider.clone(),
            model_id: setting.model_id.clone(),
            api_key: setting.api_key.clone(),
            base_url: setting.base_url.clone(),
        }
    }
}
