//! Enhanced-API backend
//!
//! Posts the URL to a remote rendering/extraction service which returns
//! markdown, HTML and page metadata.

use crate::clients::{
    build_api_client, merge_extra, status_line, BackendFailure, BackendPayload, BackendResult,
    ClientOptions, EnhancedPayload, ScrapingClient,
};
use crate::error::ScrapeError;
use crate::strategy::ScrapingStrategy;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use url::Url;

/// Default service base URL
pub const DEFAULT_ENHANCED_API_BASE_URL: &str = "https://api.firecrawl.dev";

/// Backend name used as error prefix
const BACKEND_NAME: &str = "Enhanced API";

/// Enhanced-API backend
#[derive(Debug, Clone)]
pub struct EnhancedApiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl EnhancedApiClient {
    /// Create a client for the default service endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self, ScrapeError> {
        Ok(Self {
            http: build_api_client()?,
            api_key: api_key.into(),
            base_url: DEFAULT_ENHANCED_API_BASE_URL.to_string(),
        })
    }

    /// Point the client at another deployment of the service
    ///
    /// Rejects anything that is not a plain http(s) URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ScrapeError> {
        self.base_url = validate_base_url(base_url)?;
        Ok(self)
    }

    /// Configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/scrape", self.base_url)
    }
}

#[async_trait]
impl ScrapingClient for EnhancedApiClient {
    fn name(&self) -> &'static str {
        "enhanced-api"
    }

    async fn scrape(&self, url: &str, options: &ClientOptions) -> BackendResult {
        let mut body = json!({
            "url": url,
            "formats": ["markdown", "html"],
        });
        merge_extra(&mut body, &options.extra);

        let mut request = self
            .http
            .post(self.endpoint())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        debug!(url = %url, endpoint = %self.endpoint(), "Calling enhanced API");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(BackendFailure::timeout_for(ScrapingStrategy::EnhancedApi))
            }
            Err(e) => {
                return Err(BackendFailure::new(format!(
                    "{} request failed: {}",
                    BACKEND_NAME, e
                )))
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = error_detail(&text);
            let message = if detail.is_empty() {
                format!("{} error: {}", BACKEND_NAME, status_line(status))
            } else {
                format!("{} error: {} - {}", BACKEND_NAME, status_line(status), detail)
            };
            return Err(BackendFailure::with_status(message, status.as_u16()));
        }

        let parsed: ScrapeResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                BackendFailure::timeout_for(ScrapingStrategy::EnhancedApi)
            } else {
                BackendFailure::new(format!("{} returned malformed JSON: {}", BACKEND_NAME, e))
            }
        })?;

        if !parsed.success {
            let reason = parsed
                .error
                .unwrap_or_else(|| "scraping failed".to_string());
            return Err(BackendFailure::new(format!(
                "{} error: {} - {}",
                BACKEND_NAME,
                status_line(status),
                reason
            )));
        }

        let data = parsed.data.unwrap_or_default();
        Ok(BackendPayload::Enhanced(EnhancedPayload {
            content: data.content.unwrap_or_default(),
            markdown: data.markdown.unwrap_or_default(),
            html: data.html.unwrap_or_default(),
            metadata: data.metadata.unwrap_or_default(),
        }))
    }
}

/// Service response envelope (partial)
#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ScrapeData {
    content: Option<String>,
    markdown: Option<String>,
    html: Option<String>,
    metadata: Option<Map<String, Value>>,
}

/// `error` or `message` from a JSON error body, else the raw text
fn error_detail(text: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        for key in ["error", "message"] {
            if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
                return s.to_string();
            }
        }
    }
    text.trim().to_string()
}

fn validate_base_url(base_url: &str) -> Result<String, ScrapeError> {
    let invalid = || ScrapeError::InvalidArgument(format!("invalid enhanced API base URL: {}", base_url));

    if base_url.contains("..") || base_url.contains('\\') {
        return Err(invalid());
    }
    let parsed = Url::parse(base_url).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(base_url.trim_end_matches('/').to_string())
}
