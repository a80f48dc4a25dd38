//! Scrape tool input and output types

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default per-attempt timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default page size in characters
pub const DEFAULT_MAX_CHARS: usize = 100_000;

/// What to do with scraped content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ResultHandling {
    /// Save as a resource and return only a link to it
    SaveOnly,
    /// Save as a resource and return it embedded
    #[default]
    SaveAndReturn,
    /// Return content without saving
    ReturnOnly,
}

impl ResultHandling {
    pub fn saves(&self) -> bool {
        !matches!(self, ResultHandling::ReturnOnly)
    }
}

impl FromStr for ResultHandling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "saveOnly" => Ok(ResultHandling::SaveOnly),
            "saveAndReturn" => Ok(ResultHandling::SaveAndReturn),
            "returnOnly" => Ok(ResultHandling::ReturnOnly),
            _ => Err(
                "Invalid resultHandling: must be saveOnly, saveAndReturn or returnOnly".to_string(),
            ),
        }
    }
}

impl fmt::Display for ResultHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultHandling::SaveOnly => write!(f, "saveOnly"),
            ResultHandling::SaveAndReturn => write!(f, "saveAndReturn"),
            ResultHandling::ReturnOnly => write!(f, "returnOnly"),
        }
    }
}

/// Input of the `scrape` tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    /// The webpage URL to scrape (e.g. "https://example.com/article")
    pub url: String,

    /// Maximum time to wait for each scraping attempt, in milliseconds. Default: 60000
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Maximum number of characters to return. Default: 100000
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chars: Option<usize>,

    /// Character position to start reading from, for paging through large documents. Default: 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,

    /// "saveOnly" returns a resource link, "saveAndReturn" an embedded resource,
    /// "returnOnly" plain content without saving. Default: "saveAndReturn"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_handling: Option<ResultHandling>,

    /// Scrape again even if cached content exists for this URL. Default: false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_rescrape: Option<bool>,

    /// Convert HTML to semantic Markdown, dropping scripts, navigation and
    /// boilerplate. Default: true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_scrape: Option<bool>,

    /// Natural-language query describing what to extract from the page,
    /// e.g. "the author name and publication date" or "all pricing tiers as a
    /// markdown table"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<String>,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }

    pub fn start_index(mut self, start_index: usize) -> Self {
        self.start_index = Some(start_index);
        self
    }

    pub fn result_handling(mut self, handling: ResultHandling) -> Self {
        self.result_handling = Some(handling);
        self
    }

    pub fn force_rescrape(mut self) -> Self {
        self.force_rescrape = Some(true);
        self
    }

    pub fn raw(mut self) -> Self {
        self.clean_scrape = Some(false);
        self
    }

    pub fn extract(mut self, query: impl Into<String>) -> Self {
        self.extract = Some(query.into());
        self
    }

    pub fn effective_timeout_ms(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn effective_max_chars(&self) -> usize {
        self.max_chars.unwrap_or(DEFAULT_MAX_CHARS)
    }

    pub fn effective_start_index(&self) -> usize {
        self.start_index.unwrap_or(0)
    }

    pub fn effective_result_handling(&self) -> ResultHandling {
        self.result_handling.unwrap_or_default()
    }

    pub fn wants_rescrape(&self) -> bool {
        self.force_rescrape.unwrap_or(false)
    }

    pub fn wants_clean(&self) -> bool {
        self.clean_scrape.unwrap_or(true)
    }

    /// Non-blank extraction query
    pub fn extract_query(&self) -> Option<&str> {
        self.extract.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// Resource embedded in a tool response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub text: String,
}

/// One block of tool output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ResourceLink {
        uri: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Resource {
        resource: EmbeddedResource,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    /// Text of a `Text` block or an embedded resource
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text } => Some(text),
            ContentItem::Resource { resource } => Some(&resource.text),
            ContentItem::ResourceLink { .. } => None,
        }
    }
}

/// Output of the `scrape` tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResponse {
    pub fn new(item: ContentItem) -> Self {
        Self {
            content: vec![item],
            is_error: false,
        }
    }

    /// Error block shown to the model instead of a protocol error
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: true,
        }
    }

    /// Concatenated text of all text-bearing blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
