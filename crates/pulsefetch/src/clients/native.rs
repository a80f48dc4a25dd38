//! Native HTTP backend
//!
//! Direct fetch with browser-like default headers and content-type aware
//! parsing. This is the free backend tried first in cost mode.

use crate::clients::{
    status_line, BackendFailure, BackendPayload, BackendResult, ClientOptions, HttpMethod,
    NativePayload, ScrapingClient,
};
use crate::error::ScrapeError;
use crate::parsers::{parse_content, requires_binary_handling, DEFAULT_CONTENT_TYPE};
use crate::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL,
    CONTENT_TYPE, USER_AGENT,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum body size read from a target site
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Connect timeout, independent of the per-attempt timer
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Native HTTP backend
pub struct NativeScrapingClient {
    http: reqwest::Client,
    default_headers: HeaderMap,
}

impl NativeScrapingClient {
    /// Create a native client with the default header set
    pub fn new() -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ScrapeError::ClientBuildError)?;
        Ok(Self {
            http,
            default_headers: default_headers(DEFAULT_USER_AGENT),
        })
    }

    /// Replace the default User-Agent
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(user_agent) {
            self.default_headers.insert(USER_AGENT, value);
        }
        self
    }

    /// Default headers merged with caller overrides
    fn request_headers(&self, overrides: &BTreeMap<String, String>) -> HeaderMap {
        let mut headers = self.default_headers.clone();
        for (name, value) in overrides {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Ignoring invalid header override"),
            }
        }
        headers
    }

    async fn fetch(&self, url: &str, options: &ClientOptions) -> BackendResult {
        let method = match options.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut request = self
            .http
            .request(method, url)
            .headers(self.request_headers(&options.headers));
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(failure_from_reqwest)?;
        let status = response.status();

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        if !status.is_success() {
            return Err(BackendFailure::with_status(
                format!("HTTP {}", status_line(status)),
                status.as_u16(),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        debug!(
            url = %url,
            content_type = %content_type,
            binary = requires_binary_handling(&content_type),
            "Reading native response body"
        );

        let body = read_body(response).await?;
        let parsed = parse_content(&body, &content_type).map_err(BackendFailure::new)?;

        Ok(BackendPayload::Native(NativePayload {
            data: parsed.content,
            status_code: status.as_u16(),
            content_type,
            content_length: body.len(),
            headers,
            metadata: parsed.metadata,
        }))
    }
}

#[async_trait]
impl ScrapingClient for NativeScrapingClient {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn scrape(&self, url: &str, options: &ClientOptions) -> BackendResult {
        match options.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.fetch(url, options)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(url = %url, timeout_ms = timeout.as_millis() as u64, "Native fetch aborted");
                    Err(BackendFailure::timeout())
                }
            },
            None => self.fetch(url, options).await,
        }
    }
}

/// Browser-like header set sent with every native request
fn default_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

fn failure_from_reqwest(err: reqwest::Error) -> BackendFailure {
    if err.is_timeout() {
        BackendFailure::timeout()
    } else if err.is_connect() {
        BackendFailure::new(format!("Failed to connect: {}", err))
    } else {
        BackendFailure::new(err.to_string())
    }
}

/// Read the body up to [`MAX_BODY_BYTES`]
async fn read_body(response: reqwest::Response) -> Result<Bytes, BackendFailure> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(failure_from_reqwest)?;
        body.extend_from_slice(&chunk);
        if body.len() > MAX_BODY_BYTES {
            warn!(limit = MAX_BODY_BYTES, "Response body exceeds limit, truncating");
            body.truncate(MAX_BODY_BYTES);
            break;
        }
    }

    Ok(Bytes::from(body))
}
