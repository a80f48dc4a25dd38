//! The `scrape` tool: builder, schema and execution
//!
//! Execution order: validate, serve from cache, scrape adaptively, clean,
//! extract, paginate, save.

use crate::clean::{clean_content, detect_content_type};
use crate::clients::ScrapingClients;
use crate::error::ScrapeError;
use crate::extract::ExtractClient;
use crate::orchestrator::{Orchestrator, ScrapeOptions};
use crate::result::ScrapeResult;
use crate::storage::{
    MemoryResourceStorage, MultiResourceWrite, ResourceData, ResourceStorage, ResourceType,
};
use crate::strategy::OptimizeFor;
use crate::strategy_config::{FilesystemStrategyConfigStore, StrategyConfigStore};
use crate::types::{ContentItem, EmbeddedResource, ResultHandling, ScrapeRequest, ToolResponse};
use crate::{TOOL_DESCRIPTION, TOOL_LLMTXT};
use schemars::schema_for;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Name the tool is published under
pub const TOOL_NAME: &str = "scrape";

/// Builder for [`ScrapeTool`]
#[derive(Default)]
pub struct ScrapeToolBuilder {
    clients: Option<ScrapingClients>,
    optimize_for: OptimizeFor,
    strategy_store: Option<Arc<dyn StrategyConfigStore>>,
    storage: Option<Arc<dyn ResourceStorage>>,
    extract_client: Option<Arc<dyn ExtractClient>>,
}

impl ScrapeToolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backends to scrape with (default: native only)
    pub fn clients(mut self, clients: ScrapingClients) -> Self {
        self.clients = Some(clients);
        self
    }

    pub fn optimize_for(mut self, optimize_for: OptimizeFor) -> Self {
        self.optimize_for = optimize_for;
        self
    }

    /// Learned strategy store (default: markdown file under the temp dir)
    pub fn strategy_store(mut self, store: Arc<dyn StrategyConfigStore>) -> Self {
        self.strategy_store = Some(store);
        self
    }

    /// Resource storage (default: in memory)
    pub fn storage(mut self, storage: Arc<dyn ResourceStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Enables the `extract` parameter
    pub fn extract_client(mut self, client: Arc<dyn ExtractClient>) -> Self {
        self.extract_client = Some(client);
        self
    }

    pub fn build(self) -> Result<ScrapeTool, ScrapeError> {
        let clients = match self.clients {
            Some(clients) => clients,
            None => ScrapingClients::with_defaults()?,
        };
        Ok(ScrapeTool {
            orchestrator: Orchestrator::new(clients).with_optimize_for(self.optimize_for),
            strategy_store: self
                .strategy_store
                .unwrap_or_else(|| Arc::new(FilesystemStrategyConfigStore::with_default_path())),
            storage: self
                .storage
                .unwrap_or_else(|| Arc::new(MemoryResourceStorage::new())),
            extract_client: self.extract_client,
        })
    }
}

/// Configured scrape tool
#[derive(Clone)]
pub struct ScrapeTool {
    orchestrator: Orchestrator,
    strategy_store: Arc<dyn StrategyConfigStore>,
    storage: Arc<dyn ResourceStorage>,
    extract_client: Option<Arc<dyn ExtractClient>>,
}

impl fmt::Debug for ScrapeTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeTool")
            .field("orchestrator", &self.orchestrator)
            .field("extract", &self.extract_client.is_some())
            .finish()
    }
}

impl ScrapeTool {
    pub fn builder() -> ScrapeToolBuilder {
        ScrapeToolBuilder::new()
    }

    pub fn name(&self) -> &'static str {
        TOOL_NAME
    }

    pub fn description(&self) -> &'static str {
        TOOL_DESCRIPTION
    }

    pub fn llmtxt(&self) -> &'static str {
        TOOL_LLMTXT
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn strategy_store(&self) -> &Arc<dyn StrategyConfigStore> {
        &self.strategy_store
    }

    pub fn storage(&self) -> &Arc<dyn ResourceStorage> {
        &self.storage
    }

    pub fn has_extract(&self) -> bool {
        self.extract_client.is_some()
    }

    /// Input schema as JSON; `extract` is only advertised when usable
    pub fn input_schema(&self) -> serde_json::Value {
        let schema = schema_for!(ScrapeRequest);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        if !self.has_extract() {
            if let Some(props) = value.get_mut("properties").and_then(|p| p.as_object_mut()) {
                props.remove("extract");
            }
        }

        value
    }

    pub fn output_schema(&self) -> serde_json::Value {
        let schema = schema_for!(ToolResponse);
        serde_json::to_value(schema).unwrap_or_default()
    }

    /// Run the tool from raw JSON arguments, folding every error into the response
    pub async fn call(&self, arguments: serde_json::Value) -> ToolResponse {
        let req: ScrapeRequest = match serde_json::from_value(arguments) {
            Ok(req) => req,
            Err(e) => return ToolResponse::error(format!("Invalid arguments: {}", e)),
        };
        match self.execute(req).await {
            Ok(response) => response,
            Err(e) => ToolResponse::error(format!("Error: {}", e)),
        }
    }

    /// Run the tool
    ///
    /// Invalid input and storage failures are `Err`. A scrape where every
    /// backend failed is an `Ok` response flagged `is_error`.
    pub async fn execute(&self, req: ScrapeRequest) -> Result<ToolResponse, ScrapeError> {
        validate_url(&req.url)?;
        let extract = req.extract_query();
        if extract.is_some() && !self.has_extract() {
            return Err(ScrapeError::NotConfigured(
                "extract requires an LLM endpoint".to_string(),
            ));
        }

        if !req.wants_rescrape() {
            if let Some(response) = self.serve_cached(&req, extract).await {
                return Ok(response);
            }
        }

        let options = ScrapeOptions::new(req.url.as_str())
            .with_timeout(Duration::from_millis(req.effective_timeout_ms()));
        let result = self
            .orchestrator
            .scrape_with_strategy(self.strategy_store.as_ref(), &options, None)
            .await;

        if !result.success {
            return Ok(ToolResponse::error(failure_message(&req.url, &result)));
        }

        let raw = result.content.clone().unwrap_or_default();
        let cleaned = req
            .wants_clean()
            .then(|| clean_content(&raw, &req.url, None));

        let extracted = match (extract, &self.extract_client) {
            (Some(query), Some(client)) => {
                let input = cleaned.as_deref().unwrap_or(&raw);
                debug!(url = %req.url, query = %query, "Extracting");
                Some(client.extract(input, query).await?)
            }
            _ => None,
        };

        let display = extracted
            .as_deref()
            .or(cleaned.as_deref())
            .unwrap_or(&raw);
        let page = match paginate(display, req.effective_start_index(), req.effective_max_chars()) {
            Ok(page) => page,
            Err(message) => return Ok(ToolResponse::error(message)),
        };

        let handling = req.effective_result_handling();
        if !handling.saves() {
            return Ok(ToolResponse::new(ContentItem::text(page)));
        }

        let raw_type = result
            .metadata
            .get("contentType")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| detect_content_type(&raw, &req.url).mime_type().to_string());
        let uris = self
            .storage
            .write_multi(&MultiResourceWrite {
                url: req.url.clone(),
                raw,
                cleaned,
                extracted,
                extraction_prompt: extract.map(str::to_string),
                content_type: Some(raw_type.clone()),
                source: Some(result.source_name().to_string()),
            })
            .await?;

        let (uri, mime_type) = match (&uris.extracted, &uris.cleaned) {
            (Some(uri), _) => (uri.clone(), "text/plain".to_string()),
            (None, Some(uri)) => (uri.clone(), "text/markdown".to_string()),
            (None, None) => (uris.raw.clone(), raw_type),
        };
        let description = format!("Scraped from {} via {}", req.url, result.source_name());
        info!(url = %req.url, uri = %uri, "Saved scrape");

        let item = if handling == ResultHandling::SaveOnly {
            ContentItem::ResourceLink {
                uri,
                name: req.url.clone(),
                mime_type: Some(mime_type),
                description: Some(description),
            }
        } else {
            ContentItem::Resource {
                resource: EmbeddedResource {
                    uri,
                    name: Some(req.url.clone()),
                    mime_type: Some(mime_type),
                    description: Some(description),
                    text: page,
                },
            }
        };
        Ok(ToolResponse::new(item))
    }

    /// Newest cached resource for the request, if any
    ///
    /// Cache errors are logged and treated as a miss.
    async fn serve_cached(&self, req: &ScrapeRequest, extract: Option<&str>) -> Option<ToolResponse> {
        let found = match self.storage.find_by_url_and_extract(&req.url, extract).await {
            Ok(found) => found,
            Err(e) => {
                warn!(url = %req.url, error = %e, "Cache lookup failed");
                return None;
            }
        };
        let resource = pick_cached(&found, req.wants_clean())?;
        let content = match self.storage.read(&resource.uri).await {
            Ok(content) => content,
            Err(e) => {
                warn!(uri = %resource.uri, error = %e, "Cached resource unreadable");
                return None;
            }
        };

        debug!(url = %req.url, uri = %resource.uri, "Serving from cache");
        let page = match paginate(&content.text, req.effective_start_index(), req.effective_max_chars()) {
            Ok(page) => page,
            Err(message) => return Some(ToolResponse::error(message)),
        };
        let text = format!(
            "{}\n\n[Served from cache: {} (scraped {}). Use forceRescrape to fetch fresh content.]",
            page,
            resource.uri,
            resource.metadata.timestamp.to_rfc3339()
        );
        Some(ToolResponse::new(ContentItem::text(text)))
    }
}

/// Prefer extracted, then cleaned, then raw
fn pick_cached(found: &[ResourceData], wants_clean: bool) -> Option<&ResourceData> {
    let mut preference = vec![ResourceType::Extracted];
    if wants_clean {
        preference.push(ResourceType::Cleaned);
    }
    preference.push(ResourceType::Raw);

    preference
        .into_iter()
        .find_map(|t| found.iter().find(|r| r.metadata.resource_type == t))
}

fn validate_url(url: &str) -> Result<(), ScrapeError> {
    if url.trim().is_empty() {
        return Err(ScrapeError::MissingUrl);
    }
    let parsed = Url::parse(url).map_err(|e| ScrapeError::InvalidUrl(format!("{}: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScrapeError::InvalidUrl(format!(
            "{}: only http and https are supported",
            url
        )));
    }
    Ok(())
}

/// Slice `content` by characters, with a continuation hint when more remains
fn paginate(content: &str, start: usize, max_chars: usize) -> Result<String, String> {
    let total = content.chars().count();
    if start > 0 && start >= total {
        return Err(format!(
            "startIndex {} is beyond the end of the content ({} characters)",
            start, total
        ));
    }

    let end = start.saturating_add(max_chars).min(total);
    let mut page: String = content.chars().skip(start).take(end - start).collect();
    if end < total {
        page.push_str(&format!(
            "\n\n[Content truncated at {} of {} characters. Call again with startIndex: {} to continue.]",
            end, total, end
        ));
    }
    Ok(page)
}

fn failure_message(url: &str, result: &ScrapeResult) -> String {
    let mut message = format!(
        "Failed to scrape {}\n\n{}\n\n{}",
        url,
        result.error.as_deref().unwrap_or("Unknown error"),
        result.diagnostics.summary()
    );
    if result.is_auth_error {
        let backends = result
            .diagnostics
            .auth_failures
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        message.push_str(&format!(
            "\n\nAuthentication failed for: {}. Check the API key configured for that backend.",
            backends
        ));
    }
    message
}
