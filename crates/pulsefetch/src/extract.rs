//! LLM-backed structured extraction from scraped content
//!
//! Two wire protocols are supported: OpenAI-style chat completions (used for
//! OpenAI itself and any compatible server) and the Anthropic Messages API.
//! [`build_extract_client`] picks one from an [`ExtractProvider`].

use crate::error::ScrapeError;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default model when none is configured
pub const DEFAULT_EXTRACT_MODEL: &str = "gpt-4.1-mini";

/// Default model for the Anthropic provider
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";

/// Base URL of the hosted OpenAI API
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Base URL of the hosted Anthropic API
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Messages API version sent with every Anthropic request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Upper bound for a single extraction call
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(120);

const MAX_TOKENS: u64 = 4096;

const SYSTEM_PROMPT: &str = "You are a precise content extraction assistant. \
Extract exactly the information the user asks for from the provided web page content. \
Follow any output format the user requests. If the requested information is not \
present, say so plainly instead of guessing.";

/// Answers a natural-language query about page content
#[async_trait]
pub trait ExtractClient: Send + Sync {
    /// Extract what `query` asks for from `content`
    async fn extract(&self, content: &str, query: &str) -> Result<String, ScrapeError>;
}

/// LLM service used for extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractProvider {
    /// Anthropic Messages API
    Anthropic,
    /// Hosted OpenAI chat completions
    OpenAi,
    /// Any server speaking the chat-completions protocol
    OpenAiCompatible,
}

impl ExtractProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractProvider::Anthropic => "anthropic",
            ExtractProvider::OpenAi => "openai",
            ExtractProvider::OpenAiCompatible => "openai-compatible",
        }
    }
}

impl fmt::Display for ExtractProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(ExtractProvider::Anthropic),
            "openai" => Ok(ExtractProvider::OpenAi),
            "openai-compatible" | "openai_compatible" => Ok(ExtractProvider::OpenAiCompatible),
            other => Err(format!("Unsupported LLM provider: {}", other)),
        }
    }
}

/// Settings for [`build_extract_client`]
#[derive(Debug, Clone, Default)]
pub struct ExtractConfig {
    pub api_key: Option<String>,
    /// Overrides the provider's hosted endpoint; required for `openai-compatible`
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// Build the extract client for a provider
///
/// The hosted providers need an API key; `openai-compatible` needs a base URL
/// and sends the key only when one is given.
pub fn build_extract_client(
    provider: ExtractProvider,
    config: ExtractConfig,
) -> Result<Arc<dyn ExtractClient>, ScrapeError> {
    let require_key = |key: Option<String>| {
        key.ok_or_else(|| {
            ScrapeError::InvalidArgument(format!("LLM provider {} requires an API key", provider))
        })
    };

    match provider {
        ExtractProvider::Anthropic => {
            let mut client = AnthropicExtractClient::new(require_key(config.api_key)?)?;
            if let Some(base_url) = config.base_url {
                client = client.with_base_url(base_url);
            }
            if let Some(model) = config.model {
                client = client.with_model(model);
            }
            Ok(Arc::new(client))
        }
        ExtractProvider::OpenAi | ExtractProvider::OpenAiCompatible => {
            let base_url = match (provider, config.base_url) {
                (_, Some(base_url)) => base_url,
                (ExtractProvider::OpenAi, None) => OPENAI_BASE_URL.to_string(),
                _ => {
                    return Err(ScrapeError::InvalidArgument(
                        "LLM provider openai-compatible requires a base URL".to_string(),
                    ))
                }
            };
            let api_key = match provider {
                ExtractProvider::OpenAi => Some(require_key(config.api_key)?),
                _ => config.api_key,
            };

            let mut client = OpenAiCompatibleExtractClient::new(base_url)?;
            if let Some(key) = api_key {
                client = client.with_api_key(key);
            }
            if let Some(model) = config.model {
                client = client.with_model(model);
            }
            Ok(Arc::new(client))
        }
    }
}

fn user_prompt(content: &str, query: &str) -> String {
    format!(
        "Extract the following from the page content below: {}\n\nPage content:\n{}",
        query, content
    )
}

/// Client for any OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleExtractClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleExtractClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(ScrapeError::ClientBuildError)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: None,
            model: DEFAULT_EXTRACT_MODEL.to_string(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ExtractClient for OpenAiCompatibleExtractClient {
    async fn extract(&self, content: &str, query: &str) -> Result<String, ScrapeError> {
        let request = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt(content, query),
                },
            ],
            max_tokens: Some(MAX_TOKENS),
            temperature: Some(0.0),
        };

        let mut rb = self
            .http
            .post(self.endpoint())
            .timeout(EXTRACT_TIMEOUT)
            .header(CONTENT_TYPE, "application/json");
        if let Some(key) = &self.api_key {
            rb = rb.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        debug!(model = %self.model, chars = content.len(), "Running extraction");

        let resp = rb
            .json(&request)
            .send()
            .await
            .map_err(|e| ScrapeError::Extract(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Extract(format!(
                "chat completions HTTP {}",
                status
            )));
        }

        let parsed: ChatCompletionsResponse = resp
            .json()
            .await
            .map_err(|e| ScrapeError::Extract(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ScrapeError::Extract("model returned no content".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicExtractClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicExtractClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(ScrapeError::ClientBuildError)?;
        Ok(Self {
            http,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ExtractClient for AnthropicExtractClient {
    async fn extract(&self, content: &str, query: &str) -> Result<String, ScrapeError> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user_prompt(content, query),
            }],
        };

        debug!(model = %self.model, chars = content.len(), "Running extraction");

        let resp = self
            .http
            .post(self.endpoint())
            .timeout(EXTRACT_TIMEOUT)
            .header(CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScrapeError::Extract(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Extract(format!("messages HTTP {}", status)));
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| ScrapeError::Extract(e.to_string()))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.trim().is_empty() {
            return Err(ScrapeError::Extract("model returned no content".to_string()));
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u64,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}
