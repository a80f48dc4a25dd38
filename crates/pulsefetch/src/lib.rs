//! PulseFetch - adaptive web scraping for LLM tools
//!
//! Scrapes a URL with whichever backend works for it, falling back in order
//! and remembering the winner per URL prefix so later scrapes of the same
//! site go straight to it.
//!
//! ## Backends
//!
//! - [`NativeScrapingClient`] - direct HTTP fetch, always available
//! - [`EnhancedApiClient`] - remote rendering/extraction service
//! - [`AntiBotProxyClient`] - remote unlocker for hostile sites
//!
//! The [`Orchestrator`] picks the order (learned preference first, then
//! the [`OptimizeFor`] default) and records outcomes in a
//! [`StrategyConfigStore`]. [`ScrapeTool`] wraps it with cleaning, LLM
//! extraction, pagination and resource storage for MCP use.

mod clean;
pub mod clients;
mod convert;
mod error;
mod extract;
mod orchestrator;
mod parsers;
mod result;
pub mod storage;
mod strategy;
pub mod strategy_config;
mod tool;
mod types;

pub use clean::{clean_content, detect_content_type, ContentKind, TRUNCATION_MARKER};
pub use clients::{
    AntiBotProxyClient, BackendFailure, BackendPayload, BackendResult, ClientOptions,
    EnhancedApiClient, NativeScrapingClient, ScrapingClient, ScrapingClients,
};
pub use convert::{html_to_markdown, html_to_text};
pub use error::{ScrapeError, StoreError};
pub use extract::{
    build_extract_client, AnthropicExtractClient, ExtractClient, ExtractConfig, ExtractProvider,
    OpenAiCompatibleExtractClient, DEFAULT_ANTHROPIC_MODEL, DEFAULT_EXTRACT_MODEL,
};
pub use orchestrator::{Orchestrator, ScrapeOptions, EMPTY_CONTENT_ERROR};
pub use parsers::{parse_content, requires_binary_handling, ParsedContent};
pub use result::{Diagnostics, ScrapeResult};
pub use storage::{FilesystemResourceStorage, MemoryResourceStorage, ResourceStorage};
pub use strategy::{OptimizeFor, ScrapingStrategy};
pub use strategy_config::{
    extract_url_pattern, FilesystemStrategyConfigStore, MemoryStrategyConfigStore,
    StrategyConfigEntry, StrategyConfigStore,
};
pub use tool::{ScrapeTool, ScrapeToolBuilder, TOOL_NAME};
pub use types::{
    ContentItem, EmbeddedResource, ResultHandling, ScrapeRequest, ToolResponse,
    DEFAULT_MAX_CHARS, DEFAULT_TIMEOUT_MS,
};

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; PulseFetch/1.0; +https://github.com/pulsefetch/pulsefetch)";

/// Tool description for LLM consumption
pub const TOOL_DESCRIPTION: &str = r#"Scrapes a webpage and returns its content as clean Markdown.

- Falls back automatically from a direct fetch to rendering and anti-bot backends
- Remembers which backend works for each site
- Optional natural-language extraction of specific information
- Large pages are paginated; results are saved as resources and cached"#;

/// Extended documentation for LLM consumption (llmtxt)
pub const TOOL_LLMTXT: &str = r#"# PulseFetch Scrape Tool

Scrapes a webpage and returns its content, picking whichever scraping backend
works for the site.

## Backends
- `native`: direct HTTP fetch (always available)
- `enhanced-api`: remote rendering service, for JavaScript-heavy pages
- `anti-bot-proxy`: remote unlocker, for sites that block automated clients

The first successful backend for a URL prefix is remembered and tried first
next time.

## Input Parameters
- `url` (required): The page to scrape (http:// or https://)
- `timeout` (optional): Per-attempt timeout in milliseconds (default: 60000)
- `maxChars` (optional): Maximum characters to return (default: 100000)
- `startIndex` (optional): Character offset to continue from (default: 0)
- `resultHandling` (optional): `saveOnly`, `saveAndReturn` (default) or `returnOnly`
- `forceRescrape` (optional): Ignore cached content (default: false)
- `cleanScrape` (optional): Convert HTML to Markdown (default: true)
- `extract` (optional, when enabled): What to extract, in plain words

## Output
- `returnOnly`: a text block with the content
- `saveAndReturn`: an embedded resource with its URI and the content
- `saveOnly`: a resource link; read it with resources/read

Content longer than `maxChars` ends with a hint giving the `startIndex` to
continue from.

## Examples

### Scrape an article
```json
{"url": "https://example.com/article"}
```

### Read the next page of a long document
```json
{"url": "https://example.com/long", "startIndex": 100000}
```

### Extract specific information
```json
{"url": "https://example.com/pricing", "extract": "all pricing tiers as a table"}
```

## Error Handling
- Invalid URLs return an error
- When every backend fails, the error lists each attempt with its timing and message
- Authentication failures name the backend whose API key was rejected
"#;
