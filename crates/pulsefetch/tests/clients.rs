//! HTTP backends against wiremock

use pulsefetch::{
    build_extract_client, AnthropicExtractClient, AntiBotProxyClient, BackendPayload,
    ClientOptions, EnhancedApiClient, ExtractClient, ExtractConfig, ExtractProvider,
    NativeScrapingClient, OpenAiCompatibleExtractClient, ScrapeError, ScrapingClient,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_native_html() {
    let mock_server = MockServer::start().await;

    let html = "<html><head><title>Test Page</title></head><body><h1>Hi</h1></body></html>";
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(&mock_server)
        .await;

    let client = NativeScrapingClient::new().unwrap();
    let payload = client
        .scrape(&format!("{}/page", mock_server.uri()), &ClientOptions::default())
        .await
        .unwrap();

    let BackendPayload::Native(native) = payload else {
        panic!("expected native payload");
    };
    assert_eq!(native.status_code, 200);
    assert_eq!(native.data, html);
    assert_eq!(native.content_type, "text/html; charset=utf-8");
    assert_eq!(native.content_length, html.len());
    assert_eq!(native.metadata["title"], "Test Page");
}

#[tokio::test]
async fn test_native_status_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = NativeScrapingClient::new().unwrap();
    let failure = client
        .scrape(
            &format!("{}/missing", mock_server.uri()),
            &ClientOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.status_code, Some(404));
    assert!(failure.message.starts_with("HTTP 404"));
}

#[tokio::test]
async fn test_native_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let client = NativeScrapingClient::new().unwrap();
    let failure = client
        .scrape(
            &mock_server.uri(),
            &ClientOptions::with_timeout(Some(Duration::from_millis(100))),
        )
        .await
        .unwrap_err();

    assert!(failure.is_timeout());
    assert_eq!(failure.message, "Request timeout");
}

#[tokio::test]
async fn test_native_plain_text_default_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"plain body".to_vec()))
        .mount(&mock_server)
        .await;

    let client = NativeScrapingClient::new().unwrap();
    let payload = client
        .scrape(&mock_server.uri(), &ClientOptions::default())
        .await
        .unwrap();

    let BackendPayload::Native(native) = payload else {
        panic!("expected native payload");
    };
    assert_eq!(native.data, "plain body");
}

#[tokio::test]
async fn test_enhanced_api_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"url": "https://example.com/app"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "markdown": "# App",
                "html": "<h1>App</h1>",
                "metadata": {"title": "App"}
            }
        })))
        .mount(&mock_server)
        .await;

    let client = EnhancedApiClient::new("test-key")
        .unwrap()
        .with_base_url(&mock_server.uri())
        .unwrap();
    let payload = client
        .scrape("https://example.com/app", &ClientOptions::default())
        .await
        .unwrap();

    let BackendPayload::Enhanced(enhanced) = payload else {
        panic!("expected enhanced payload");
    };
    assert_eq!(enhanced.markdown, "# App");
    assert_eq!(enhanced.html, "<h1>App</h1>");
    assert!(enhanced.content.is_empty());
    assert_eq!(enhanced.metadata["title"], "App");
}

#[tokio::test]
async fn test_enhanced_api_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid API key"})),
        )
        .mount(&mock_server)
        .await;

    let client = EnhancedApiClient::new("bad-key")
        .unwrap()
        .with_base_url(&mock_server.uri())
        .unwrap();
    let failure = client
        .scrape("https://example.com", &ClientOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.status_code, Some(401));
    assert!(failure.message.starts_with("Enhanced API error: 401"));
    assert!(failure.message.ends_with("Invalid API key"));
}

#[tokio::test]
async fn test_enhanced_api_reported_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "error": "page could not be rendered"})),
        )
        .mount(&mock_server)
        .await;

    let client = EnhancedApiClient::new("key")
        .unwrap()
        .with_base_url(&mock_server.uri())
        .unwrap();
    let failure = client
        .scrape("https://example.com", &ClientOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.status_code, None);
    assert_eq!(
        failure.message,
        "Enhanced API error: 200 OK - page could not be rendered"
    );
}

#[tokio::test]
async fn test_enhanced_api_timeout_names_backend() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": {"markdown": "late"}}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let client = EnhancedApiClient::new("key")
        .unwrap()
        .with_base_url(&mock_server.uri())
        .unwrap();
    let failure = client
        .scrape(
            "https://example.com",
            &ClientOptions::with_timeout(Some(Duration::from_millis(100))),
        )
        .await
        .unwrap_err();

    assert!(failure.is_timeout());
    assert_eq!(failure.message, "Enhanced API request timeout");
}

#[tokio::test]
async fn test_anti_bot_proxy_raw_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/request"))
        .and(header("authorization", "Bearer token"))
        .and(body_partial_json(
            json!({"zone": "my_zone", "url": "https://example.com/guarded", "format": "raw"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>unlocked</html>"))
        .mount(&mock_server)
        .await;

    let client = AntiBotProxyClient::new("token")
        .unwrap()
        .with_zone("my_zone")
        .with_endpoint(format!("{}/request", mock_server.uri()));
    let payload = client
        .scrape("https://example.com/guarded", &ClientOptions::default())
        .await
        .unwrap();

    let BackendPayload::AntiBot(data) = payload else {
        panic!("expected anti-bot payload");
    };
    assert_eq!(data, "<html>unlocked</html>");
}

#[tokio::test]
async fn test_anti_bot_proxy_forbidden() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("zone disabled"))
        .mount(&mock_server)
        .await;

    let client = AntiBotProxyClient::new("token")
        .unwrap()
        .with_endpoint(format!("{}/request", mock_server.uri()));
    let failure = client
        .scrape("https://example.com", &ClientOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.status_code, Some(403));
    assert!(failure.message.ends_with("zone disabled"));
}

#[tokio::test]
async fn test_extract_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer llm-key"))
        .and(body_partial_json(json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Price: $10"}}]
        })))
        .mount(&mock_server)
        .await;

    let client = OpenAiCompatibleExtractClient::new(mock_server.uri())
        .unwrap()
        .with_api_key("llm-key")
        .with_model("test-model");
    let answer = client
        .extract("Our plan costs $10 per month.", "the price")
        .await
        .unwrap();

    assert_eq!(answer, "Price: $10");
}

#[tokio::test]
async fn test_extract_client_http_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = OpenAiCompatibleExtractClient::new(mock_server.uri()).unwrap();
    let err = client.extract("content", "query").await.unwrap_err();

    match err {
        ScrapeError::Extract(message) => assert!(message.contains("HTTP 500")),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_anthropic_extract_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "anthropic-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"model": "claude-test", "max_tokens": 4096})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Price: "},
                {"type": "text", "text": "$10"}
            ],
            "stop_reason": "end_turn"
        })))
        .mount(&mock_server)
        .await;

    let client = AnthropicExtractClient::new("anthropic-key")
        .unwrap()
        .with_base_url(mock_server.uri())
        .with_model("claude-test");
    let answer = client
        .extract("Our plan costs $10 per month.", "the price")
        .await
        .unwrap();

    assert_eq!(answer, "Price: $10");
}

#[tokio::test]
async fn test_anthropic_extract_client_http_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let client = build_extract_client(
        ExtractProvider::Anthropic,
        ExtractConfig {
            api_key: Some("bad".to_string()),
            base_url: Some(mock_server.uri()),
            model: None,
        },
    )
    .unwrap();
    let err = client.extract("content", "query").await.unwrap_err();

    match err {
        ScrapeError::Extract(message) => assert!(message.contains("HTTP 401")),
        other => panic!("unexpected error: {}", other),
    }
}
