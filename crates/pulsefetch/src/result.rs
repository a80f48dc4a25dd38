//! Unified scrape result and the per-backend payload normaliser

use crate::clients::BackendPayload;
use crate::strategy::ScrapingStrategy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Record of what a scrape tried
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Backends in the order they were attempted
    pub strategies_attempted: Vec<ScrapingStrategy>,
    /// Error per failed backend
    pub strategy_errors: BTreeMap<ScrapingStrategy, String>,
    /// Elapsed milliseconds per attempted backend
    pub timing: BTreeMap<ScrapingStrategy, u64>,
    /// Backends whose failure was caused by their own credentials
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auth_failures: Vec<ScrapingStrategy>,
}

impl Diagnostics {
    /// Record a completed attempt
    pub fn record_attempt(&mut self, strategy: ScrapingStrategy, elapsed_ms: u64) {
        self.strategies_attempted.push(strategy);
        self.timing.insert(strategy, elapsed_ms);
    }

    /// Record why a backend did not produce content
    pub fn record_error(&mut self, strategy: ScrapingStrategy, error: impl Into<String>) {
        self.strategy_errors.insert(strategy, error.into());
    }

    /// Flag a backend as having failed authentication
    pub fn record_auth_failure(&mut self, strategy: ScrapingStrategy) {
        if !self.auth_failures.contains(&strategy) {
            self.auth_failures.push(strategy);
        }
    }

    /// Whether any backend was attempted
    pub fn attempted_any(&self) -> bool {
        !self.strategies_attempted.is_empty()
    }

    /// Comma-separated attempted backend names
    pub fn attempted_list(&self) -> String {
        self.strategies_attempted
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Multi-line human summary, one line per attempt
    pub fn summary(&self) -> String {
        let mut lines = Vec::with_capacity(self.strategies_attempted.len() + 1);
        lines.push(format!("Strategies attempted: {}", self.attempted_list()));
        for strategy in &self.strategies_attempted {
            let timing = self
                .timing
                .get(strategy)
                .map(|ms| format!(" ({}ms)", ms))
                .unwrap_or_default();
            match self.strategy_errors.get(strategy) {
                Some(error) => lines.push(format!("- {}{}: {}", strategy, timing, error)),
                None => lines.push(format!("- {}{}: succeeded", strategy, timing)),
            }
        }
        lines.join("\n")
    }
}

/// Outcome of a scrape, successful or not
///
/// `success == true` implies `content` is `Some` and `source` names a real
/// backend. The failure constructors always set `source` to `None`, which
/// serialises as `"none"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub success: bool,
    pub content: Option<String>,
    #[serde(serialize_with = "serialize_source", deserialize_with = "deserialize_source")]
    pub source: Option<ScrapingStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub is_auth_error: bool,
    pub diagnostics: Diagnostics,
}

impl ScrapeResult {
    /// Successful result from the winning backend
    pub fn succeeded(
        source: ScrapingStrategy,
        assembled: AssembledContent,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            success: true,
            content: Some(assembled.content),
            source: Some(source),
            error: None,
            metadata: assembled.metadata,
            is_auth_error: !diagnostics.auth_failures.is_empty(),
            diagnostics,
        }
    }

    /// Failed result carrying whatever was recorded
    pub fn failed(error: impl Into<String>, diagnostics: Diagnostics) -> Self {
        Self {
            success: false,
            content: None,
            source: None,
            error: Some(error.into()),
            metadata: Map::new(),
            is_auth_error: !diagnostics.auth_failures.is_empty(),
            diagnostics,
        }
    }

    /// `source` as it appears on the wire
    pub fn source_name(&self) -> &'static str {
        self.source.map(|s| s.as_str()).unwrap_or("none")
    }
}

fn serialize_source<S: Serializer>(
    source: &Option<ScrapingStrategy>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match source {
        Some(strategy) => strategy.serialize(serializer),
        None => serializer.serialize_str("none"),
    }
}

fn deserialize_source<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ScrapingStrategy>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if raw == "none" {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(serde::de::Error::custom)
}

/// Content and metadata pulled out of a backend payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContent {
    pub content: String,
    pub metadata: Map<String, Value>,
}

/// Normalise a backend payload into content plus metadata
pub fn assemble(payload: BackendPayload) -> AssembledContent {
    match payload {
        BackendPayload::Native(native) => {
            let mut metadata = native.metadata;
            metadata.insert("statusCode".to_string(), native.status_code.into());
            metadata.insert("contentType".to_string(), native.content_type.into());
            metadata.insert("contentLength".to_string(), native.content_length.into());
            AssembledContent {
                content: native.data,
                metadata,
            }
        }
        BackendPayload::Enhanced(enhanced) => {
            let content = [enhanced.markdown, enhanced.html, enhanced.content]
                .into_iter()
                .find(|s| !s.trim().is_empty())
                .unwrap_or_default();
            AssembledContent {
                content,
                metadata: enhanced.metadata,
            }
        }
        BackendPayload::AntiBot(data) => AssembledContent {
            content: data,
            metadata: Map::new(),
        },
    }
}
