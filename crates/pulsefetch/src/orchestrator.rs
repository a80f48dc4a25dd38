//! Strategy orchestration
//!
//! Decides which backends to try for a URL, runs them one after another
//! until one yields content, and feeds the winner back into the strategy
//! config so the next visit to the same section starts there.
//!
//! Attempts are strictly sequential. Each one gets the full caller timeout;
//! there is no budget shared across the chain.

use crate::clients::{BackendFailure, ClientOptions, ScrapingClients};
use crate::result::{assemble, Diagnostics, ScrapeResult};
use crate::strategy::{OptimizeFor, ScrapingStrategy};
use crate::strategy_config::{extract_url_pattern, StrategyConfigEntry, StrategyConfigStore};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Error recorded when a backend succeeds with nothing usable
pub const EMPTY_CONTENT_ERROR: &str = "Empty content returned";

/// Lowercased fragments that mark a backend rejecting its own credentials
const AUTH_ERROR_MARKERS: &[&str] = &[
    "unauthorized",
    "invalid api key",
    "invalid token",
    "authentication",
    "api key",
];

/// Input for a single scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOptions {
    pub url: String,
    /// Per-attempt timeout
    pub timeout: Option<Duration>,
}

impl ScrapeOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Runs scrapes across the configured backends
#[derive(Debug, Clone)]
pub struct Orchestrator {
    clients: ScrapingClients,
    optimize_for: OptimizeFor,
}

impl Orchestrator {
    /// Orchestrator in cost mode
    pub fn new(clients: ScrapingClients) -> Self {
        Self {
            clients,
            optimize_for: OptimizeFor::default(),
        }
    }

    /// Set the optimization mode
    pub fn with_optimize_for(mut self, optimize_for: OptimizeFor) -> Self {
        self.optimize_for = optimize_for;
        self
    }

    pub fn optimize_for(&self) -> OptimizeFor {
        self.optimize_for
    }

    pub fn clients(&self) -> &ScrapingClients {
        &self.clients
    }

    /// Attempt order for a URL given its stored preference
    pub fn strategy_order(&self, preferred: Option<ScrapingStrategy>) -> Vec<ScrapingStrategy> {
        plan_order(self.optimize_for, preferred, |s| self.clients.is_configured(s))
    }

    /// Full fallback chain in the default order, without consulting any store
    pub async fn scrape_universal(&self, options: &ScrapeOptions) -> ScrapeResult {
        let order = self.strategy_order(None);
        self.run_chain(&order, options).await
    }

    /// Exactly one backend, no fallback
    pub async fn scrape_with_single_strategy(
        &self,
        strategy: ScrapingStrategy,
        options: &ScrapeOptions,
    ) -> ScrapeResult {
        if !self.clients.is_configured(strategy) {
            let message = format!("{} is not configured", strategy);
            warn!(strategy = %strategy, "Requested strategy is not configured");
            let mut diagnostics = Diagnostics::default();
            diagnostics.record_error(strategy, message.clone());
            return ScrapeResult::failed(message, diagnostics);
        }
        self.run_chain(&[strategy], options).await
    }

    /// Adaptive scrape that learns from the config store
    ///
    /// With `explicit` set this is [`scrape_with_single_strategy`] and the
    /// store is neither read nor written. Store errors are logged and never
    /// affect the returned result.
    ///
    /// [`scrape_with_single_strategy`]: Orchestrator::scrape_with_single_strategy
    pub async fn scrape_with_strategy(
        &self,
        store: &dyn StrategyConfigStore,
        options: &ScrapeOptions,
        explicit: Option<ScrapingStrategy>,
    ) -> ScrapeResult {
        if let Some(strategy) = explicit {
            return self.scrape_with_single_strategy(strategy, options).await;
        }

        let preferred = match store.get_strategy_for_url(&options.url).await {
            Ok(preferred) => preferred,
            Err(e) => {
                warn!(url = %options.url, error = %e, "Failed to read strategy config");
                None
            }
        };
        let order = self.strategy_order(preferred);
        debug!(
            url = %options.url,
            preferred = ?preferred,
            order = ?order,
            mode = %self.optimize_for,
            "Planned strategy order"
        );

        let result = self.run_chain(&order, options).await;

        let pattern = extract_url_pattern(&options.url);
        match result.source {
            Some(winner) if result.success => record_success(store, &pattern, winner).await,
            _ if result.diagnostics.attempted_any() => record_failure(store, &pattern).await,
            _ => {}
        }

        result
    }

    async fn run_chain(&self, order: &[ScrapingStrategy], options: &ScrapeOptions) -> ScrapeResult {
        let mut diagnostics = Diagnostics::default();

        if let Err(e) = Url::parse(&options.url) {
            return ScrapeResult::failed(format!("Invalid URL: {}", e), diagnostics);
        }

        let client_options = ClientOptions::with_timeout(options.timeout);
        let mut last_error = None;

        for &strategy in order {
            let Some(client) = self.clients.get(strategy) else {
                continue;
            };

            debug!(strategy = %strategy, url = %options.url, "Attempting scrape");
            let start = Instant::now();
            let attempt = client.scrape(&options.url, &client_options);
            let outcome = match options.timeout {
                Some(limit) => tokio::time::timeout(limit, attempt)
                    .await
                    .unwrap_or_else(|_| Err(BackendFailure::timeout_for(strategy))),
                None => attempt.await,
            };
            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            diagnostics.record_attempt(strategy, elapsed_ms);

            let failure = match outcome {
                Ok(payload) => {
                    let assembled = assemble(payload);
                    if !assembled.content.trim().is_empty() {
                        info!(strategy = %strategy, url = %options.url, elapsed_ms, "Scrape succeeded");
                        return ScrapeResult::succeeded(strategy, assembled, diagnostics);
                    }
                    BackendFailure::new(EMPTY_CONTENT_ERROR)
                }
                Err(failure) => failure,
            };

            if is_auth_failure(strategy, &failure) {
                warn!(
                    strategy = %strategy,
                    error = %failure,
                    "Backend rejected its credentials, check the API key"
                );
                diagnostics.record_auth_failure(strategy);
            } else {
                warn!(strategy = %strategy, url = %options.url, error = %failure, elapsed_ms, "Scrape attempt failed");
            }
            diagnostics.record_error(strategy, failure.message.clone());
            last_error = Some(failure.message);
        }

        let error = match last_error {
            Some(last) => format!(
                "All scraping strategies failed. Attempted: {}. Last error: {}",
                diagnostics.attempted_list(),
                last
            ),
            None => format!("No scraping strategies available for {}", options.url),
        };
        ScrapeResult::failed(error, diagnostics)
    }
}

/// Attempt order for a mode and an optional stored preference
///
/// The stored strategy goes first, followed by the mode's default order
/// without it. A preference is ignored when its backend is unconfigured, and
/// a `native` preference is ignored in speed mode.
pub fn plan_order(
    optimize_for: OptimizeFor,
    preferred: Option<ScrapingStrategy>,
    is_configured: impl Fn(ScrapingStrategy) -> bool,
) -> Vec<ScrapingStrategy> {
    let preferred = preferred.filter(|&p| {
        is_configured(p) && !(optimize_for == OptimizeFor::Speed && p == ScrapingStrategy::Native)
    });

    let mut order: Vec<ScrapingStrategy> = preferred.into_iter().collect();
    order.extend(
        optimize_for
            .default_order()
            .iter()
            .copied()
            .filter(|&s| is_configured(s) && Some(s) != preferred),
    );
    order
}

/// Whether a failure is a remote backend rejecting its own credentials
///
/// Native failures are never auth failures: a 401 there comes from the
/// target site, not from anything we configured.
pub fn is_auth_failure(strategy: ScrapingStrategy, failure: &BackendFailure) -> bool {
    if !strategy.is_remote() {
        return false;
    }
    if matches!(failure.status_code, Some(401) | Some(403)) {
        return true;
    }
    let message = failure.message.to_lowercase();
    AUTH_ERROR_MARKERS.iter().any(|m| message.contains(m))
}

async fn record_success(store: &dyn StrategyConfigStore, pattern: &str, winner: ScrapingStrategy) {
    let (success_count, failure_count) = match store.find_entry(pattern).await {
        Ok(Some(existing)) => (existing.success_count, existing.failure_count),
        Ok(None) => (0, 0),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Failed to read strategy config");
            (0, 0)
        }
    };

    let entry = StrategyConfigEntry {
        url_pattern: pattern.to_string(),
        strategy: winner,
        last_updated: Utc::now(),
        success_count: success_count.saturating_add(1),
        failure_count,
    };

    match store.upsert_entry(entry).await {
        Ok(()) => info!(pattern = %pattern, strategy = %winner, "Recorded winning strategy"),
        Err(e) => warn!(pattern = %pattern, error = %e, "Failed to save strategy config"),
    }
}

async fn record_failure(store: &dyn StrategyConfigStore, pattern: &str) {
    let existing = match store.find_entry(pattern).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Failed to read strategy config");
            return;
        }
    };

    let entry = StrategyConfigEntry {
        failure_count: existing.failure_count.saturating_add(1),
        last_updated: Utc::now(),
        ..existing
    };
    if let Err(e) = store.upsert_entry(entry).await {
        warn!(pattern = %pattern, error = %e, "Failed to save strategy config");
    }
}
