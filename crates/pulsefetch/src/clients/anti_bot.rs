//! Anti-bot proxy backend
//!
//! Sends the URL through a remote unlocker service that returns the raw page.

use crate::clients::{
    build_api_client, merge_extra, status_line, BackendFailure, BackendPayload, BackendResult,
    ClientOptions, ScrapingClient,
};
use crate::error::ScrapeError;
use crate::strategy::ScrapingStrategy;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;
use tracing::debug;

/// Default unlocker endpoint
pub const DEFAULT_ANTI_BOT_ENDPOINT: &str = "https://api.brightdata.com/request";

/// Default unlocker zone
pub const DEFAULT_ANTI_BOT_ZONE: &str = "mcp_server_unlocker";

/// Anti-bot proxy backend
#[derive(Debug, Clone)]
pub struct AntiBotProxyClient {
    http: reqwest::Client,
    token: String,
    endpoint: String,
    zone: String,
}

impl AntiBotProxyClient {
    /// Create a client for the default endpoint and zone
    pub fn new(token: impl Into<String>) -> Result<Self, ScrapeError> {
        Ok(Self {
            http: build_api_client()?,
            token: token.into(),
            endpoint: DEFAULT_ANTI_BOT_ENDPOINT.to_string(),
            zone: DEFAULT_ANTI_BOT_ZONE.to_string(),
        })
    }

    /// Use a different unlocker zone
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    /// Override the request endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ScrapingClient for AntiBotProxyClient {
    fn name(&self) -> &'static str {
        "anti-bot-proxy"
    }

    async fn scrape(&self, url: &str, options: &ClientOptions) -> BackendResult {
        let mut body = json!({
            "zone": self.zone,
            "url": url,
            "format": "raw",
        });
        merge_extra(&mut body, &options.extra);

        let mut request = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        debug!(url = %url, zone = %self.zone, "Calling anti-bot proxy");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(BackendFailure::timeout_for(ScrapingStrategy::AntiBotProxy))
            }
            Err(e) => {
                return Err(BackendFailure::new(format!(
                    "Anti-bot proxy request failed: {}",
                    e
                )))
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.trim();
            let message = if text.is_empty() {
                format!("Anti-bot proxy error: {}", status_line(status))
            } else {
                format!("Anti-bot proxy error: {} - {}", status_line(status), text)
            };
            return Err(BackendFailure::with_status(message, status.as_u16()));
        }

        match response.text().await {
            Ok(data) => Ok(BackendPayload::AntiBot(data)),
            Err(e) if e.is_timeout() => Err(BackendFailure::timeout_for(
                ScrapingStrategy::AntiBotProxy,
            )),
            Err(e) => Err(BackendFailure::new(format!(
                "Anti-bot proxy body read failed: {}",
                e
            ))),
        }
    }
}
