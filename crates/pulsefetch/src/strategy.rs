//! Scraping strategies and optimization modes

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fetch backend
///
/// The set is closed: every strategy maps to exactly one client slot in
/// [`ScrapingClients`](crate::ScrapingClients).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum ScrapingStrategy {
    /// Direct HTTP fetch
    Native,
    /// Remote rendering/extraction service
    EnhancedApi,
    /// Remote anti-bot unlocker service
    AntiBotProxy,
}

impl ScrapingStrategy {
    /// All strategies, in declaration order
    pub const ALL: [ScrapingStrategy; 3] = [
        ScrapingStrategy::Native,
        ScrapingStrategy::EnhancedApi,
        ScrapingStrategy::AntiBotProxy,
    ];

    /// Wire name of the strategy
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapingStrategy::Native => "native",
            ScrapingStrategy::EnhancedApi => "enhanced-api",
            ScrapingStrategy::AntiBotProxy => "anti-bot-proxy",
        }
    }

    /// Whether this backend is a paid remote service with its own credentials
    pub fn is_remote(&self) -> bool {
        !matches!(self, ScrapingStrategy::Native)
    }
}

impl fmt::Display for ScrapingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrapingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(ScrapingStrategy::Native),
            "enhanced-api" => Ok(ScrapingStrategy::EnhancedApi),
            "anti-bot-proxy" => Ok(ScrapingStrategy::AntiBotProxy),
            other => Err(format!(
                "Invalid strategy '{}': must be native, enhanced-api or anti-bot-proxy",
                other
            )),
        }
    }
}

/// Global optimization mode for the default backend order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeFor {
    /// Free native fetch first, paid backends only as fallback
    #[default]
    Cost,
    /// Skip native fetch, go straight to the paid backends
    Speed,
}

impl OptimizeFor {
    /// Default attempt order for this mode, before filtering by configuration
    pub fn default_order(&self) -> &'static [ScrapingStrategy] {
        match self {
            OptimizeFor::Cost => &[
                ScrapingStrategy::Native,
                ScrapingStrategy::EnhancedApi,
                ScrapingStrategy::AntiBotProxy,
            ],
            OptimizeFor::Speed => &[ScrapingStrategy::EnhancedApi, ScrapingStrategy::AntiBotProxy],
        }
    }
}

impl fmt::Display for OptimizeFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizeFor::Cost => write!(f, "cost"),
            OptimizeFor::Speed => write!(f, "speed"),
        }
    }
}

impl FromStr for OptimizeFor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cost" => Ok(OptimizeFor::Cost),
            "speed" => Ok(OptimizeFor::Speed),
            other => Err(format!(
                "Invalid optimization mode '{}': must be cost or speed",
                other
            )),
        }
    }
}
