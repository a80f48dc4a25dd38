//! In-process strategy config

use super::{StrategyConfigEntry, StrategyConfigStore};
use crate::error::StoreError;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Strategy config held in memory, lost on drop
#[derive(Debug, Default)]
pub struct MemoryStrategyConfigStore {
    entries: RwLock<Vec<StrategyConfigEntry>>,
}

impl MemoryStrategyConfigStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with entries
    pub fn with_entries(entries: Vec<StrategyConfigEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl StrategyConfigStore for MemoryStrategyConfigStore {
    async fn load_config(&self) -> Result<Vec<StrategyConfigEntry>, StoreError> {
        Ok(self.entries.read().await.clone())
    }

    async fn save_config(&self, entries: &[StrategyConfigEntry]) -> Result<(), StoreError> {
        *self.entries.write().await = entries.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ScrapingStrategy;

    #[tokio::test]
    async fn test_upsert_replaces_same_pattern() {
        let store = MemoryStrategyConfigStore::new();
        store
            .upsert_entry(StrategyConfigEntry::new("a.com/", ScrapingStrategy::Native))
            .await
            .unwrap();
        store
            .upsert_entry(StrategyConfigEntry::new("a.com/", ScrapingStrategy::EnhancedApi))
            .await
            .unwrap();

        let entries = store.load_config().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].strategy, ScrapingStrategy::EnhancedApi);
    }

    #[tokio::test]
    async fn test_unknown_url_has_no_strategy() {
        let store = MemoryStrategyConfigStore::with_entries(vec![StrategyConfigEntry::new(
            "a.com/",
            ScrapingStrategy::Native,
        )]);
        assert_eq!(
            store.get_strategy_for_url("https://b.com/x").await.unwrap(),
            None
        );
    }
}
