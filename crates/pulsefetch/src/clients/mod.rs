//! Backend clients for content fetching
//!
//! Design: every backend implements [`ScrapingClient`] and reports failures
//! as values. Nothing crosses the client boundary as a panic or an `Err` the
//! caller has to special-case: network errors, timeouts, non-success bodies
//! and malformed JSON all become a [`BackendFailure`].

mod anti_bot;
mod enhanced;
mod native;

pub use anti_bot::AntiBotProxyClient;
pub use enhanced::EnhancedApiClient;
pub use native::NativeScrapingClient;

use crate::error::ScrapeError;
use crate::strategy::ScrapingStrategy;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// HTTP method for native requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMethod {
    /// HTTP GET request
    #[default]
    Get,
    /// HTTP POST request
    Post,
}

/// Per-attempt options passed to a backend
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Abort the attempt after this long
    pub timeout: Option<Duration>,
    /// Request method (native only)
    pub method: HttpMethod,
    /// Headers overriding the native defaults
    pub headers: BTreeMap<String, String>,
    /// Request body (native only)
    pub body: Option<String>,
    /// Extra fields merged into remote API request bodies
    pub extra: Map<String, Value>,
}

impl ClientOptions {
    /// Options with only a timeout set
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Successful native fetch
#[derive(Debug, Clone, Default)]
pub struct NativePayload {
    /// Parsed body
    pub data: String,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header (defaults to text/plain)
    pub content_type: String,
    /// Raw body size in bytes
    pub content_length: usize,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Parser metadata
    pub metadata: Map<String, Value>,
}

/// Successful enhanced-API scrape
#[derive(Debug, Clone, Default)]
pub struct EnhancedPayload {
    /// Plain content (empty when the service omitted it)
    pub content: String,
    /// Markdown rendering
    pub markdown: String,
    /// Rendered HTML
    pub html: String,
    /// Page metadata reported by the service
    pub metadata: Map<String, Value>,
}

/// Backend-specific success shape, unified later by [`assemble`](crate::result::assemble)
#[derive(Debug, Clone)]
pub enum BackendPayload {
    /// Native fetch result
    Native(NativePayload),
    /// Enhanced-API result
    Enhanced(EnhancedPayload),
    /// Raw text from the anti-bot proxy
    AntiBot(String),
}

/// A failed backend attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    /// Human-readable description
    pub message: String,
    /// HTTP status returned by the backend, when there was one
    pub status_code: Option<u16>,
    timed_out: bool,
}

impl BackendFailure {
    /// Failure without an HTTP status
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            timed_out: false,
        }
    }

    /// Failure carrying the HTTP status that caused it
    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status_code: Some(status),
            timed_out: false,
        }
    }

    /// The distinguished timeout failure of the native backend
    pub fn timeout() -> Self {
        Self::timeout_with(TIMEOUT_ERROR)
    }

    /// Timeout failure with a backend-specific message
    pub fn timeout_with(message: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::new(message)
        }
    }

    /// Timeout failure worded for the given backend
    pub fn timeout_for(strategy: ScrapingStrategy) -> Self {
        match strategy {
            ScrapingStrategy::Native => Self::timeout(),
            ScrapingStrategy::EnhancedApi => Self::timeout_with("Enhanced API request timeout"),
            ScrapingStrategy::AntiBotProxy => Self::timeout_with("Anti-bot proxy request timeout"),
        }
    }

    /// Whether this failure is the per-attempt timeout
    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Error text for an attempt aborted by its timer
pub const TIMEOUT_ERROR: &str = "Request timeout";

/// Outcome of one backend attempt
pub type BackendResult = Result<BackendPayload, BackendFailure>;

/// Trait for fetch backends
#[async_trait]
pub trait ScrapingClient: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Fetch the URL
    ///
    /// Implementations must convert every failure mode into a
    /// [`BackendFailure`].
    async fn scrape(&self, url: &str, options: &ClientOptions) -> BackendResult;
}

/// The configured backends
///
/// Native is always present. The remote backends are present only when
/// credentials were supplied; absence is a configuration fact, not a failure.
#[derive(Clone)]
pub struct ScrapingClients {
    native: Arc<dyn ScrapingClient>,
    enhanced_api: Option<Arc<dyn ScrapingClient>>,
    anti_bot_proxy: Option<Arc<dyn ScrapingClient>>,
}

impl fmt::Debug for ScrapingClients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapingClients")
            .field("configured", &self.configured())
            .finish()
    }
}

impl ScrapingClients {
    /// Client set with only the given native backend
    pub fn new(native: Arc<dyn ScrapingClient>) -> Self {
        Self {
            native,
            enhanced_api: None,
            anti_bot_proxy: None,
        }
    }

    /// Client set with the built-in native backend
    pub fn with_defaults() -> Result<Self, ScrapeError> {
        Ok(Self::new(Arc::new(NativeScrapingClient::new()?)))
    }

    /// Add the enhanced-API backend
    pub fn with_enhanced_api(mut self, client: Arc<dyn ScrapingClient>) -> Self {
        self.enhanced_api = Some(client);
        self
    }

    /// Add the anti-bot proxy backend
    pub fn with_anti_bot_proxy(mut self, client: Arc<dyn ScrapingClient>) -> Self {
        self.anti_bot_proxy = Some(client);
        self
    }

    /// Client for a strategy, if configured
    pub fn get(&self, strategy: ScrapingStrategy) -> Option<&Arc<dyn ScrapingClient>> {
        match strategy {
            ScrapingStrategy::Native => Some(&self.native),
            ScrapingStrategy::EnhancedApi => self.enhanced_api.as_ref(),
            ScrapingStrategy::AntiBotProxy => self.anti_bot_proxy.as_ref(),
        }
    }

    /// Whether a strategy has a configured client
    pub fn is_configured(&self, strategy: ScrapingStrategy) -> bool {
        self.get(strategy).is_some()
    }

    /// Configured strategies in declaration order
    pub fn configured(&self) -> Vec<ScrapingStrategy> {
        ScrapingStrategy::ALL
            .into_iter()
            .filter(|s| self.is_configured(*s))
            .collect()
    }
}

/// "404 Not Found" style status line
pub(crate) fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Shared HTTP client for the remote API backends
pub(crate) fn build_api_client() -> Result<reqwest::Client, ScrapeError> {
    reqwest::Client::builder()
        .connect_timeout(API_CONNECT_TIMEOUT)
        .build()
        .map_err(ScrapeError::ClientBuildError)
}

/// Merge caller-supplied fields into a JSON request body
pub(crate) fn merge_extra(body: &mut Value, extra: &Map<String, Value>) {
    if let Some(obj) = body.as_object_mut() {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
}

/// Connect timeout for remote API backends
const API_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
