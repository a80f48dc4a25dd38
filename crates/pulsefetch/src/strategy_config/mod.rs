//! Learned URL-pattern → strategy mapping
//!
//! Each successful adaptive scrape records which backend won for the URL's
//! pattern, so repeat visits to the same site section start with the backend
//! that worked last time instead of walking the whole fallback chain.
//!
//! Stores are read fully and rewritten fully on every change. There is no
//! locking across requests: concurrent writers race and the last write wins,
//! which only costs routing efficiency, never content correctness.

mod filesystem;
mod memory;
pub mod table;

pub use filesystem::{default_config_path, FilesystemStrategyConfigStore, DEFAULT_CONFIG_FILE};
pub use memory::MemoryStrategyConfigStore;

use crate::error::StoreError;
use crate::strategy::ScrapingStrategy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// One learned row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfigEntry {
    /// Prefix derived by [`extract_url_pattern`]
    pub url_pattern: String,
    /// Last backend that succeeded for this pattern
    pub strategy: ScrapingStrategy,
    /// When the row was last written
    pub last_updated: DateTime<Utc>,
    /// Successful adaptive scrapes recorded for this pattern
    pub success_count: u64,
    /// Adaptive scrapes where every backend failed
    pub failure_count: u64,
}

impl StrategyConfigEntry {
    /// Fresh entry with zeroed counters
    pub fn new(url_pattern: impl Into<String>, strategy: ScrapingStrategy) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            strategy,
            last_updated: Utc::now(),
            success_count: 0,
            failure_count: 0,
        }
    }
}

/// Persistent strategy config
///
/// Implementors provide whole-table load and save; lookup and upsert are
/// derived from those.
#[async_trait]
pub trait StrategyConfigStore: Send + Sync {
    /// Read every entry
    async fn load_config(&self) -> Result<Vec<StrategyConfigEntry>, StoreError>;

    /// Replace every entry
    async fn save_config(&self, entries: &[StrategyConfigEntry]) -> Result<(), StoreError>;

    /// Overwrite the entry with the same pattern, or append
    async fn upsert_entry(&self, entry: StrategyConfigEntry) -> Result<(), StoreError> {
        let mut entries = self.load_config().await?;
        upsert_into(&mut entries, entry);
        self.save_config(&entries).await
    }

    /// Entry whose pattern equals `url_pattern` exactly
    async fn find_entry(&self, url_pattern: &str) -> Result<Option<StrategyConfigEntry>, StoreError> {
        let entries = self.load_config().await?;
        Ok(entries.into_iter().find(|e| e.url_pattern == url_pattern))
    }

    /// Strategy of the longest stored prefix of the URL's pattern
    async fn get_strategy_for_url(&self, url: &str) -> Result<Option<ScrapingStrategy>, StoreError> {
        let entries = self.load_config().await?;
        let pattern = extract_url_pattern(url);
        Ok(longest_match(&entries, &pattern).map(|e| e.strategy))
    }
}

/// Derive the learning key for a URL
///
/// Drops the scheme, query and fragment, and truncates the path after its
/// last `/`:
/// `https://site.com/blog/2024/article` → `site.com/blog/2024/`.
pub fn extract_url_pattern(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) if parsed.host_str().is_some() => {
            let mut pattern = parsed.host_str().unwrap_or_default().to_string();
            if let Some(port) = parsed.port() {
                pattern.push_str(&format!(":{}", port));
            }
            pattern.push_str(truncate_after_last_slash(parsed.path()));
            pattern
        }
        _ => {
            let without_scheme = match url.find("://") {
                Some(idx) => &url[idx + 3..],
                None => url,
            };
            let without_query = without_scheme
                .split(['?', '#'])
                .next()
                .unwrap_or_default();
            if without_query.contains('/') {
                truncate_after_last_slash(without_query).to_string()
            } else {
                format!("{}/", without_query)
            }
        }
    }
}

fn truncate_after_last_slash(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    }
}

/// Whether a stored pattern covers a derived pattern
pub fn matches_prefix(stored: &str, pattern: &str) -> bool {
    !stored.is_empty() && pattern.starts_with(stored)
}

/// Stored entry with the longest pattern that prefixes `pattern`
pub fn longest_match<'a>(
    entries: &'a [StrategyConfigEntry],
    pattern: &str,
) -> Option<&'a StrategyConfigEntry> {
    entries
        .iter()
        .filter(|e| matches_prefix(&e.url_pattern, pattern))
        .max_by_key(|e| e.url_pattern.len())
}

/// Upsert by pattern equality
pub fn upsert_into(entries: &mut Vec<StrategyConfigEntry>, entry: StrategyConfigEntry) {
    match entries
        .iter_mut()
        .find(|e| e.url_pattern == entry.url_pattern)
    {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pattern: &str, strategy: ScrapingStrategy) -> StrategyConfigEntry {
        StrategyConfigEntry::new(pattern, strategy)
    }

    #[test]
    fn test_extract_url_pattern() {
        assert_eq!(
            extract_url_pattern("https://reddit.com/r/programming/comments/123/title"),
            "reddit.com/r/programming/comments/123/"
        );
        assert_eq!(
            extract_url_pattern("https://yelp.com/biz/dolly-san-francisco"),
            "yelp.com/biz/"
        );
        assert_eq!(
            extract_url_pattern("https://example.com/blog/2024/article"),
            "example.com/blog/2024/"
        );
    }

    #[test]
    fn test_extract_url_pattern_edges() {
        assert_eq!(extract_url_pattern("https://example.com"), "example.com/");
        assert_eq!(extract_url_pattern("https://example.com/"), "example.com/");
        assert_eq!(extract_url_pattern("https://example.com/docs/"), "example.com/docs/");
        assert_eq!(
            extract_url_pattern("https://example.com/a/b?x=1/2#frag/x"),
            "example.com/a/"
        );
        assert_eq!(
            extract_url_pattern("http://localhost:8080/api/items"),
            "localhost:8080/api/"
        );
        assert_eq!(extract_url_pattern("example.com/a/b"), "example.com/a/");
        assert_eq!(extract_url_pattern("example.com"), "example.com/");
    }

    #[test]
    fn test_longest_match_wins() {
        let entries = vec![
            entry("example.com/", ScrapingStrategy::Native),
            entry("example.com/blog/", ScrapingStrategy::EnhancedApi),
            entry("example.com/blog/2024/", ScrapingStrategy::AntiBotProxy),
            entry("other.com/", ScrapingStrategy::EnhancedApi),
        ];

        let m = longest_match(&entries, "example.com/blog/2024/").unwrap();
        assert_eq!(m.strategy, ScrapingStrategy::AntiBotProxy);

        let m = longest_match(&entries, "example.com/blog/2023/").unwrap();
        assert_eq!(m.strategy, ScrapingStrategy::EnhancedApi);

        let m = longest_match(&entries, "example.com/shop/").unwrap();
        assert_eq!(m.strategy, ScrapingStrategy::Native);

        assert!(longest_match(&entries, "unknown.org/").is_none());
    }

    #[test]
    fn test_matches_prefix_requires_prefix() {
        assert!(matches_prefix("example.com/", "example.com/a/"));
        assert!(!matches_prefix("example.com/a/b/", "example.com/a/"));
        assert!(!matches_prefix("", "example.com/"));
    }

    #[test]
    fn test_upsert_into_overwrites_by_pattern() {
        let mut entries = vec![entry("a.com/", ScrapingStrategy::Native)];
        upsert_into(&mut entries, entry("a.com/", ScrapingStrategy::AntiBotProxy));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].strategy, ScrapingStrategy::AntiBotProxy);

        upsert_into(&mut entries, entry("b.com/", ScrapingStrategy::Native));
        assert_eq!(entries.len(), 2);
    }
}
