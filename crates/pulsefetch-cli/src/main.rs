//! PulseFetch CLI - adaptive web scraping from the command line or over MCP

mod mcp;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pulsefetch::strategy_config::table::generate_markdown_table;
use pulsefetch::{
    build_extract_client, clean_content, extract_url_pattern, AntiBotProxyClient,
    EnhancedApiClient, ExtractConfig, ExtractProvider, FilesystemResourceStorage,
    FilesystemStrategyConfigStore, MemoryResourceStorage, OptimizeFor, Orchestrator,
    ResourceStorage, ScrapeError, ScrapeOptions, ScrapeResult, ScrapeTool, ScrapingClients,
    ScrapingStrategy, StrategyConfigStore, DEFAULT_TIMEOUT_MS, TOOL_LLMTXT,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Output format for scrape subcommand
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Markdown with YAML frontmatter
    #[default]
    Md,
    /// JSON scrape result
    Json,
}

/// Where saved resources live
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum StorageKind {
    #[default]
    Memory,
    Filesystem,
}

/// PulseFetch - adaptive web scraping for LLM tools
#[derive(Parser, Debug)]
#[command(name = "pulsefetch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print full help with examples (llmtxt)
    #[arg(long)]
    llmtxt: bool,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// API key for the enhanced rendering backend
    #[arg(long, env = "PULSEFETCH_ENHANCED_API_KEY", global = true, hide_env_values = true)]
    enhanced_api_key: Option<String>,

    /// Base URL of the enhanced rendering backend
    #[arg(long, env = "PULSEFETCH_ENHANCED_API_URL", global = true)]
    enhanced_api_url: Option<String>,

    /// Token for the anti-bot unlocker backend
    #[arg(long, env = "PULSEFETCH_ANTI_BOT_TOKEN", global = true, hide_env_values = true)]
    anti_bot_token: Option<String>,

    /// Zone for the anti-bot unlocker backend
    #[arg(long, env = "PULSEFETCH_ANTI_BOT_ZONE", global = true)]
    anti_bot_zone: Option<String>,

    /// Default backend order: cost (native first) or speed (remote only)
    #[arg(long, env = "PULSEFETCH_OPTIMIZE_FOR", global = true, default_value = "cost")]
    optimize_for: OptimizeFor,

    /// Markdown file holding learned strategies
    #[arg(long, env = "PULSEFETCH_STRATEGY_CONFIG", global = true)]
    strategy_config: Option<PathBuf>,

    /// Resource storage backend
    #[arg(long, env = "PULSEFETCH_STORAGE", global = true, value_enum, default_value = "memory")]
    storage: StorageKind,

    /// Root directory for filesystem resource storage
    #[arg(long, env = "PULSEFETCH_RESOURCE_DIR", global = true)]
    resource_dir: Option<PathBuf>,

    /// LLM service for `extract` queries: anthropic, openai or openai-compatible
    #[arg(long, env = "PULSEFETCH_LLM_PROVIDER", global = true)]
    llm_provider: Option<ExtractProvider>,

    /// LLM endpoint; a bare base URL implies openai-compatible
    #[arg(long, env = "PULSEFETCH_LLM_BASE_URL", global = true)]
    llm_base_url: Option<String>,

    #[arg(long, env = "PULSEFETCH_LLM_API_KEY", global = true, hide_env_values = true)]
    llm_api_key: Option<String>,

    #[arg(long, env = "PULSEFETCH_LLM_MODEL", global = true)]
    llm_model: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as MCP (Model Context Protocol) server over stdio
    Mcp,
    /// Scrape URL and output as markdown with metadata frontmatter
    Scrape {
        /// URL to scrape
        url: String,

        /// Use only this backend instead of the adaptive chain
        #[arg(long, short)]
        strategy: Option<ScrapingStrategy>,

        /// Per-attempt timeout in milliseconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
        timeout: u64,

        /// Output format
        #[arg(long, short, default_value = "md")]
        output: OutputFormat,
    },
    /// Show learned strategies
    Strategies {
        /// Show the pattern and stored strategy for one URL
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.llmtxt {
        writeln_safe(TOOL_LLMTXT);
        std::process::exit(0);
    }

    init_tracing(cli.verbose);

    let result = match cli.command {
        Some(Commands::Mcp) => run_mcp(&cli.config).await,
        Some(Commands::Scrape {
            url,
            strategy,
            timeout,
            output,
        }) => run_scrape(&cli.config, &url, strategy, timeout, output).await,
        Some(Commands::Strategies { url }) => run_strategies(&cli.config, url.as_deref()).await,
        None => {
            eprintln!("Usage: pulsefetch scrape <URL>");
            eprintln!("   or: pulsefetch strategies");
            eprintln!("   or: pulsefetch mcp");
            eprintln!("   or: pulsefetch --help");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries MCP traffic and scrape output
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_clients(config: &ConfigArgs) -> Result<ScrapingClients, ScrapeError> {
    let mut clients = ScrapingClients::with_defaults()?;

    if let Some(key) = non_blank(&config.enhanced_api_key) {
        let mut client = EnhancedApiClient::new(key)?;
        if let Some(base_url) = non_blank(&config.enhanced_api_url) {
            client = client.with_base_url(base_url)?;
        }
        clients = clients.with_enhanced_api(Arc::new(client));
    }

    if let Some(token) = non_blank(&config.anti_bot_token) {
        let mut client = AntiBotProxyClient::new(token)?;
        if let Some(zone) = non_blank(&config.anti_bot_zone) {
            client = client.with_zone(zone);
        }
        clients = clients.with_anti_bot_proxy(Arc::new(client));
    }

    Ok(clients)
}

fn strategy_store(config: &ConfigArgs) -> FilesystemStrategyConfigStore {
    match &config.strategy_config {
        Some(path) => FilesystemStrategyConfigStore::new(path),
        None => FilesystemStrategyConfigStore::with_default_path(),
    }
}

fn resource_storage(config: &ConfigArgs) -> Arc<dyn ResourceStorage> {
    match config.storage {
        StorageKind::Memory => Arc::new(MemoryResourceStorage::new()),
        StorageKind::Filesystem => match &config.resource_dir {
            Some(root) => Arc::new(FilesystemResourceStorage::new(root)),
            None => Arc::new(FilesystemResourceStorage::with_default_root()),
        },
    }
}

fn build_tool(config: &ConfigArgs) -> Result<ScrapeTool, ScrapeError> {
    let mut builder = ScrapeTool::builder()
        .clients(build_clients(config)?)
        .optimize_for(config.optimize_for)
        .strategy_store(Arc::new(strategy_store(config)))
        .storage(resource_storage(config));

    let provider = config.llm_provider.or_else(|| {
        non_blank(&config.llm_base_url).map(|_| ExtractProvider::OpenAiCompatible)
    });
    if let Some(provider) = provider {
        let extract = ExtractConfig {
            api_key: non_blank(&config.llm_api_key).map(str::to_string),
            base_url: non_blank(&config.llm_base_url).map(str::to_string),
            model: non_blank(&config.llm_model).map(str::to_string),
        };
        builder = builder.extract_client(build_extract_client(provider, extract)?);
    }

    builder.build()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

async fn run_mcp(config: &ConfigArgs) -> Result<(), ScrapeError> {
    let tool = build_tool(config)?;
    mcp::run_server(tool).await;
    Ok(())
}

async fn run_scrape(
    config: &ConfigArgs,
    url: &str,
    strategy: Option<ScrapingStrategy>,
    timeout_ms: u64,
    output: OutputFormat,
) -> Result<(), ScrapeError> {
    let orchestrator =
        Orchestrator::new(build_clients(config)?).with_optimize_for(config.optimize_for);
    let store = strategy_store(config);
    let options = ScrapeOptions::new(url).with_timeout(Duration::from_millis(timeout_ms));

    let result = orchestrator
        .scrape_with_strategy(&store, &options, strategy)
        .await;

    match output {
        OutputFormat::Md => writeln_safe(&format_md_with_frontmatter(url, &result)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                eprintln!("Error serializing result: {}", e);
                std::process::exit(1);
            });
            writeln_safe(&json);
        }
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_strategies(config: &ConfigArgs, url: Option<&str>) -> Result<(), ScrapeError> {
    let store = strategy_store(config);

    match url {
        Some(url) => {
            let pattern = extract_url_pattern(url);
            let strategy = store.get_strategy_for_url(url).await?;
            writeln_safe(&format!("pattern: {}", pattern));
            writeln_safe(&format!(
                "strategy: {}",
                strategy.map(|s| s.as_str()).unwrap_or("none")
            ));
        }
        None => {
            let entries = store.load_config().await?;
            writeln_safe(&format!("<!-- {} -->", store.path().display()));
            writeln_safe(&generate_markdown_table(&entries));
        }
    }
    Ok(())
}

/// Format a scrape result as markdown with YAML frontmatter
///
/// Successful content is cleaned to Markdown; failures put the error and
/// per-backend diagnostics in the body.
fn format_md_with_frontmatter(url: &str, result: &ScrapeResult) -> String {
    let mut output = String::new();

    output.push_str("---\n");
    output.push_str(&format!("url: {}\n", url));
    output.push_str(&format!("source: {}\n", result.source_name()));
    output.push_str(&format!(
        "strategies_attempted: [{}]\n",
        result.diagnostics.attempted_list()
    ));
    if let Some(status) = result.metadata.get("statusCode") {
        output.push_str(&format!("status_code: {}\n", status));
    }
    if let Some(ct) = result.metadata.get("contentType").and_then(|v| v.as_str()) {
        output.push_str(&format!("source_content_type: {}\n", ct));
    }
    if result.is_auth_error {
        output.push_str("auth_error: true\n");
    }
    output.push_str("---\n");

    match (&result.content, &result.error) {
        (Some(content), _) if result.success => {
            output.push_str(&clean_content(content, url, None));
        }
        (_, Some(error)) => {
            output.push_str(error);
            output.push_str("\n\n");
            output.push_str(&result.diagnostics.summary());
        }
        _ => {}
    }

    output
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsefetch::Diagnostics;
    use serde_json::json;

    fn success_result(content: &str) -> ScrapeResult {
        let mut diagnostics = Diagnostics::default();
        diagnostics.record_attempt(ScrapingStrategy::Native, 12);
        let metadata = json!({"statusCode": 200, "contentType": "text/html"});
        ScrapeResult {
            success: true,
            content: Some(content.to_string()),
            source: Some(ScrapingStrategy::Native),
            error: None,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            is_auth_error: false,
            diagnostics,
        }
    }

    #[test]
    fn test_format_md_success() {
        let result = success_result("<html><body><h1>Hello World</h1></body></html>");
        let output = format_md_with_frontmatter("https://example.com", &result);

        assert!(output.starts_with("---\n"));
        assert!(output.contains("url: https://example.com\n"));
        assert!(output.contains("source: native\n"));
        assert!(output.contains("strategies_attempted: [native]\n"));
        assert!(output.contains("status_code: 200\n"));
        assert!(output.contains("source_content_type: text/html\n"));
        assert!(output.contains("---\n# Hello World"));
        assert!(!output.contains("auth_error"));
    }

    #[test]
    fn test_format_md_failure_as_body() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.record_attempt(ScrapingStrategy::Native, 5);
        diagnostics.record_error(ScrapingStrategy::Native, "HTTP 403");
        let result = ScrapeResult::failed(
            "All scraping strategies failed. Attempted: native. Last error: HTTP 403",
            diagnostics,
        );

        let output = format_md_with_frontmatter("https://example.com", &result);
        assert!(output.contains("source: none\n"));
        assert!(output.contains("---\nAll scraping strategies failed."));
        assert!(output.contains("- native (5ms): HTTP 403"));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(&Some("  key ".to_string())), Some("key"));
        assert_eq!(non_blank(&Some("   ".to_string())), None);
        assert_eq!(non_blank(&None), None);
    }

    #[test]
    fn test_cli_parses_scrape() {
        let cli = Cli::try_parse_from([
            "pulsefetch",
            "scrape",
            "https://example.com",
            "--strategy",
            "anti-bot-proxy",
            "--output",
            "json",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Scrape {
                strategy, timeout, ..
            }) => {
                assert_eq!(strategy, Some(ScrapingStrategy::AntiBotProxy));
                assert_eq!(timeout, DEFAULT_TIMEOUT_MS);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_llm_provider_selects_extract_client() {
        let cli = Cli::try_parse_from([
            "pulsefetch",
            "--llm-provider",
            "anthropic",
            "--llm-api-key",
            "key",
            "mcp",
        ])
        .unwrap();
        assert_eq!(cli.config.llm_provider, Some(ExtractProvider::Anthropic));
        assert!(build_tool(&cli.config).unwrap().has_extract());

        // A bare base URL still enables the compatible client
        let config = ConfigArgs {
            llm_base_url: Some("http://localhost:11434".to_string()),
            ..Default::default()
        };
        assert!(build_tool(&config).unwrap().has_extract());

        let config = ConfigArgs {
            llm_provider: Some(ExtractProvider::OpenAi),
            ..Default::default()
        };
        assert!(matches!(
            build_tool(&config),
            Err(ScrapeError::InvalidArgument(_))
        ));

        assert!(!build_tool(&ConfigArgs::default()).unwrap().has_extract());
    }
}
