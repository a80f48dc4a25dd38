//! In-process resource storage

use super::{sanitize_url, ResourceContent, ResourceData, ResourceMetadata, ResourceStorage};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use url::Url;

#[derive(Debug, Clone)]
struct StoredResource {
    data: ResourceData,
    content: String,
}

/// Resources held in memory, lost on drop
#[derive(Debug, Default)]
pub struct MemoryResourceStorage {
    resources: RwLock<BTreeMap<String, StoredResource>>,
}

impl MemoryResourceStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn generate_uri(metadata: &ResourceMetadata) -> String {
    format!(
        "memory://{}/{}_{}",
        metadata.resource_type,
        sanitize_url(&metadata.url),
        metadata.timestamp.format("%Y%m%d%H%M%S%f")
    )
}

fn generate_name(metadata: &ResourceMetadata) -> String {
    let host = Url::parse(&metadata.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| sanitize_url(&metadata.url));
    format!(
        "{}/{}_{}",
        metadata.resource_type,
        host,
        metadata.timestamp.format("%Y-%m-%d")
    )
}

#[async_trait]
impl ResourceStorage for MemoryResourceStorage {
    async fn list(&self) -> Result<Vec<ResourceData>, StoreError> {
        Ok(self
            .resources
            .read()
            .await
            .values()
            .map(|r| r.data.clone())
            .collect())
    }

    async fn read(&self, uri: &str) -> Result<ResourceContent, StoreError> {
        let resources = self.resources.read().await;
        let stored = resources
            .get(uri)
            .ok_or_else(|| StoreError::NotFound(uri.to_string()))?;
        Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type: stored.data.mime_type.clone(),
            text: stored.content.clone(),
        })
    }

    async fn write(&self, content: &str, metadata: ResourceMetadata) -> Result<String, StoreError> {
        let uri = generate_uri(&metadata);
        let name = generate_name(&metadata);
        let data = ResourceData::from_metadata(uri.clone(), name, metadata);
        self.resources.write().await.insert(
            uri.clone(),
            StoredResource {
                data,
                content: content.to_string(),
            },
        );
        Ok(uri)
    }

    async fn exists(&self, uri: &str) -> Result<bool, StoreError> {
        Ok(self.resources.read().await.contains_key(uri))
    }

    async fn delete(&self, uri: &str) -> Result<(), StoreError> {
        self.resources
            .write()
            .await
            .remove(uri)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(uri.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MultiResourceWrite, ResourceType};

    #[tokio::test]
    async fn test_write_read_delete() {
        let storage = MemoryResourceStorage::new();
        let mut metadata = ResourceMetadata::new("https://example.com/page", ResourceType::Raw);
        metadata.content_type = Some("text/html".to_string());

        let uri = storage.write("<p>hi</p>", metadata).await.unwrap();
        assert!(uri.starts_with("memory://raw/example.com_page_"));
        assert!(storage.exists(&uri).await.unwrap());

        let content = storage.read(&uri).await.unwrap();
        assert_eq!(content.text, "<p>hi</p>");
        assert_eq!(content.mime_type, "text/html");

        let listed = storage.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].description, "Fetched content from https://example.com/page");
        assert!(listed[0].name.starts_with("raw/example.com_"));

        storage.delete(&uri).await.unwrap();
        assert!(!storage.exists(&uri).await.unwrap());
        assert!(matches!(
            storage.delete(&uri).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            storage.read(&uri).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_write_multi_and_find_by_extract() {
        let storage = MemoryResourceStorage::new();
        let uris = storage
            .write_multi(&MultiResourceWrite {
                url: "https://example.com/a".to_string(),
                raw: "<h1>A</h1>".to_string(),
                cleaned: Some("# A".to_string()),
                extracted: Some("A".to_string()),
                extraction_prompt: Some("the heading".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(uris.raw.starts_with("memory://raw/"));
        assert!(uris.cleaned.as_deref().unwrap().starts_with("memory://cleaned/"));
        assert!(uris.extracted.as_deref().unwrap().starts_with("memory://extracted/"));

        let all = storage.find_by_url("https://example.com/a").await.unwrap();
        assert_eq!(all.len(), 3);

        let plain = storage
            .find_by_url_and_extract("https://example.com/a", None)
            .await
            .unwrap();
        assert_eq!(plain.len(), 2);

        let extracted = storage
            .find_by_url_and_extract("https://example.com/a", Some("the heading"))
            .await
            .unwrap();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].metadata.resource_type, ResourceType::Extracted);

        let other = storage
            .find_by_url_and_extract("https://example.com/a", Some("something else"))
            .await
            .unwrap();
        assert!(other.is_empty());
    }
}
