//! End-to-end scrape tool tests with wiremock and in-memory stores

use pulsefetch::storage::ResourceType;
use pulsefetch::{
    ContentItem, EnhancedApiClient, FilesystemResourceStorage, MemoryResourceStorage,
    MemoryStrategyConfigStore, NativeScrapingClient, OpenAiCompatibleExtractClient,
    ResourceStorage, ResultHandling, ScrapeError, ScrapeRequest, ScrapeTool, ScrapingClients,
    ScrapingStrategy, StrategyConfigStore,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Article</title><script>track()</script></head>
<body>
    <nav><a href="/">Home</a></nav>
    <h1>Hello World</h1>
    <p>This is a <strong>test</strong> paragraph.</p>
</body>
</html>"#;

struct Fixture {
    server: MockServer,
    tool: ScrapeTool,
    storage: Arc<MemoryResourceStorage>,
    store: Arc<MemoryStrategyConfigStore>,
}

impl Fixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html"))
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryResourceStorage::new());
        let store = Arc::new(MemoryStrategyConfigStore::new());
        let tool = ScrapeTool::builder()
            .strategy_store(store.clone())
            .storage(storage.clone())
            .build()
            .unwrap();

        Self {
            server,
            tool,
            storage,
            store,
        }
    }

    fn url(&self, p: &str) -> String {
        format!("{}{}", self.server.uri(), p)
    }
}

#[tokio::test]
async fn test_save_and_return_embeds_cleaned_markdown() {
    let fx = Fixture::new().await;
    let url = fx.url("/article");

    let response = fx.tool.execute(ScrapeRequest::new(&url)).await.unwrap();

    assert!(!response.is_error);
    let ContentItem::Resource { resource } = &response.content[0] else {
        panic!("expected embedded resource, got {:?}", response.content);
    };
    assert!(resource.uri.starts_with("memory://cleaned/"));
    assert_eq!(resource.mime_type.as_deref(), Some("text/markdown"));
    assert!(resource.text.contains("# Hello World"));
    assert!(resource.text.contains("**test**"));
    assert!(!resource.text.contains("track()"));
    assert!(!resource.text.contains("Home"));

    // Raw and cleaned forms are both saved
    let saved = fx.storage.find_by_url(&url).await.unwrap();
    assert_eq!(saved.len(), 2);
    let raw = saved
        .iter()
        .find(|r| r.metadata.resource_type == ResourceType::Raw)
        .unwrap();
    assert_eq!(raw.mime_type, "text/html");
    assert_eq!(raw.metadata.source.as_deref(), Some("native"));

    // The native win is learned
    assert_eq!(
        fx.store.get_strategy_for_url(&url).await.unwrap(),
        Some(ScrapingStrategy::Native)
    );
}

#[tokio::test]
async fn test_return_only_does_not_save() {
    let fx = Fixture::new().await;
    let request =
        ScrapeRequest::new(fx.url("/article")).result_handling(ResultHandling::ReturnOnly);

    let response = fx.tool.execute(request).await.unwrap();

    assert!(matches!(response.content[0], ContentItem::Text { .. }));
    assert!(response.text().contains("# Hello World"));
    assert!(fx.storage.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_only_returns_link() {
    let fx = Fixture::new().await;
    let url = fx.url("/article");
    let request = ScrapeRequest::new(&url).result_handling(ResultHandling::SaveOnly);

    let response = fx.tool.execute(request).await.unwrap();

    let ContentItem::ResourceLink { uri, name, .. } = &response.content[0] else {
        panic!("expected resource link");
    };
    assert_eq!(name, &url);
    let content = fx.storage.read(uri).await.unwrap();
    assert!(content.text.contains("# Hello World"));
}

#[tokio::test]
async fn test_raw_scrape_keeps_html() {
    let fx = Fixture::new().await;
    let request = ScrapeRequest::new(fx.url("/article"))
        .raw()
        .result_handling(ResultHandling::ReturnOnly);

    let response = fx.tool.execute(request).await.unwrap();

    assert!(response.text().contains("<h1>Hello World</h1>"));
}

#[tokio::test]
async fn test_second_call_served_from_cache() {
    let fx = Fixture::new().await;
    let url = fx.url("/article");

    fx.tool.execute(ScrapeRequest::new(&url)).await.unwrap();
    let cached = fx.tool.execute(ScrapeRequest::new(&url)).await.unwrap();

    let text = cached.text();
    assert!(text.contains("# Hello World"));
    assert!(text.contains("[Served from cache: memory://cleaned/"));
    assert_eq!(fx.server.received_requests().await.unwrap().len(), 1);

    // forceRescrape goes back to the network
    fx.tool
        .execute(ScrapeRequest::new(&url).force_rescrape())
        .await
        .unwrap();
    assert_eq!(fx.server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_pagination() {
    let fx = Fixture::new().await;
    let url = fx.url("/article");

    let first = fx
        .tool
        .execute(
            ScrapeRequest::new(&url)
                .max_chars(5)
                .result_handling(ResultHandling::ReturnOnly),
        )
        .await
        .unwrap();
    let text = first.text();
    assert!(text.starts_with("# Hel\n\n[Content truncated at 5 of "));
    assert!(text.contains("startIndex: 5"));

    let beyond = fx
        .tool
        .execute(
            ScrapeRequest::new(&url)
                .start_index(100_000)
                .result_handling(ResultHandling::ReturnOnly),
        )
        .await
        .unwrap();
    assert!(beyond.is_error);
    assert!(beyond.text().contains("beyond the end"));
}

#[tokio::test]
async fn test_all_backends_failed_is_error_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid API key"})),
        )
        .mount(&server)
        .await;

    let clients = ScrapingClients::new(Arc::new(NativeScrapingClient::new().unwrap()))
        .with_enhanced_api(Arc::new(
            EnhancedApiClient::new("bad")
                .unwrap()
                .with_base_url(&server.uri())
                .unwrap(),
        ));
    let tool = ScrapeTool::builder()
        .clients(clients)
        .strategy_store(Arc::new(MemoryStrategyConfigStore::new()))
        .build()
        .unwrap();

    let url = format!("{}/blocked", server.uri());
    let response = tool.execute(ScrapeRequest::new(&url)).await.unwrap();

    assert!(response.is_error);
    let text = response.text();
    assert!(text.starts_with(&format!("Failed to scrape {}", url)));
    assert!(text.contains("Strategies attempted: native, enhanced-api"));
    assert!(text.contains("Authentication failed for: enhanced-api"));
    assert!(tool.storage().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_extract_saves_all_three_forms() {
    let fx_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html"))
        .mount(&fx_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Title: Hello World"}}]
        })))
        .mount(&fx_server)
        .await;

    let storage = Arc::new(MemoryResourceStorage::new());
    let tool = ScrapeTool::builder()
        .strategy_store(Arc::new(MemoryStrategyConfigStore::new()))
        .storage(storage.clone())
        .extract_client(Arc::new(
            OpenAiCompatibleExtractClient::new(fx_server.uri()).unwrap(),
        ))
        .build()
        .unwrap();
    assert!(tool.input_schema()["properties"]["extract"].is_object());

    let url = format!("{}/article", fx_server.uri());
    let response = tool
        .execute(ScrapeRequest::new(&url).extract("the title"))
        .await
        .unwrap();

    let ContentItem::Resource { resource } = &response.content[0] else {
        panic!("expected embedded resource");
    };
    assert!(resource.uri.starts_with("memory://extracted/"));
    assert_eq!(resource.text, "Title: Hello World");

    let saved = storage.find_by_url(&url).await.unwrap();
    assert_eq!(saved.len(), 3);
    let extracted = storage
        .find_by_url_and_extract(&url, Some("the title"))
        .await
        .unwrap();
    assert_eq!(extracted.len(), 1);

    // Same query is served from the cache
    let cached = tool
        .execute(ScrapeRequest::new(&url).extract("the title"))
        .await
        .unwrap();
    assert!(cached.text().contains("Served from cache: memory://extracted/"));
}

#[tokio::test]
async fn test_filesystem_storage_round_trip() {
    let fx_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html"))
        .mount(&fx_server)
        .await;

    let dir = TempDir::new().unwrap();
    let tool = ScrapeTool::builder()
        .strategy_store(Arc::new(MemoryStrategyConfigStore::new()))
        .storage(Arc::new(FilesystemResourceStorage::new(dir.path())))
        .build()
        .unwrap();

    let url = format!("{}/doc", fx_server.uri());
    let response = tool
        .execute(ScrapeRequest::new(&url).result_handling(ResultHandling::SaveOnly))
        .await
        .unwrap();

    let ContentItem::ResourceLink { uri, .. } = &response.content[0] else {
        panic!("expected resource link");
    };
    assert!(uri.starts_with("file://"));
    assert!(uri.ends_with(".md"));
    let content = tool.storage().read(uri).await.unwrap();
    assert!(content.text.contains("# Hello World"));
}

#[tokio::test]
async fn test_invalid_input() {
    let tool = ScrapeTool::builder()
        .strategy_store(Arc::new(MemoryStrategyConfigStore::new()))
        .build()
        .unwrap();

    assert!(matches!(
        tool.execute(ScrapeRequest::new("")).await,
        Err(ScrapeError::MissingUrl)
    ));
    assert!(matches!(
        tool.execute(ScrapeRequest::new("file:///etc/passwd")).await,
        Err(ScrapeError::InvalidUrl(_))
    ));

    assert!(matches!(
        tool.execute(ScrapeRequest::new("https://example.com").extract("the title"))
            .await,
        Err(ScrapeError::NotConfigured(_))
    ));

    let response = tool.call(json!({"maxChars": 10})).await;
    assert!(response.is_error);
    assert!(response.text().starts_with("Invalid arguments"));

    let response = tool.call(json!({"url": "mailto:someone@example.com"})).await;
    assert!(response.is_error);
    assert!(response.text().starts_with("Error: Invalid URL"));
}
