//! Resource storage for scraped content
//!
//! Every scrape can be saved in up to three forms (raw, cleaned and
//! extracted), each addressable by URI and listable over MCP.

mod filesystem;
mod memory;

pub use filesystem::FilesystemResourceStorage;
pub use memory::MemoryResourceStorage;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Form a saved resource is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Raw,
    Cleaned,
    Extracted,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [
        ResourceType::Raw,
        ResourceType::Cleaned,
        ResourceType::Extracted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Raw => "raw",
            ResourceType::Cleaned => "cleaned",
            ResourceType::Extracted => "extracted",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(ResourceType::Raw),
            "cleaned" => Ok(ResourceType::Cleaned),
            "extracted" => Ok(ResourceType::Extracted),
            other => Err(StoreError::Format(format!("unknown resource type '{}'", other))),
        }
    }
}

/// Metadata stored alongside each resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    /// URL the content was scraped from
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Query used to produce extracted content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_prompt: Option<String>,
    /// Backend that produced the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResourceMetadata {
    /// Metadata stamped with the current time
    pub fn new(url: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            url: url.into(),
            timestamp: Utc::now(),
            resource_type,
            content_type: None,
            description: None,
            extraction_prompt: None,
            source: None,
            extra: Map::new(),
        }
    }
}

/// A listed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceData {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
    pub metadata: ResourceMetadata,
}

impl ResourceData {
    fn from_metadata(uri: String, name: String, metadata: ResourceMetadata) -> Self {
        Self {
            description: metadata
                .description
                .clone()
                .unwrap_or_else(|| format!("Fetched content from {}", metadata.url)),
            mime_type: metadata
                .content_type
                .clone()
                .unwrap_or_else(|| "text/plain".to_string()),
            uri,
            name,
            metadata,
        }
    }
}

/// Body of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

/// The forms of one scrape to save together
#[derive(Debug, Clone, Default)]
pub struct MultiResourceWrite {
    pub url: String,
    pub raw: String,
    pub cleaned: Option<String>,
    pub extracted: Option<String>,
    pub extraction_prompt: Option<String>,
    /// MIME type of the raw form; cleaned is Markdown and extracted is plain text
    pub content_type: Option<String>,
    pub source: Option<String>,
}

/// URIs written by [`ResourceStorage::write_multi`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiResourceUris {
    pub raw: String,
    pub cleaned: Option<String>,
    pub extracted: Option<String>,
}

/// Storage for scraped resources
#[async_trait]
pub trait ResourceStorage: Send + Sync {
    async fn list(&self) -> Result<Vec<ResourceData>, StoreError>;

    /// Read a resource body; [`StoreError::NotFound`] if absent
    async fn read(&self, uri: &str) -> Result<ResourceContent, StoreError>;

    /// Save content, returning its URI
    async fn write(&self, content: &str, metadata: ResourceMetadata) -> Result<String, StoreError>;

    async fn exists(&self, uri: &str) -> Result<bool, StoreError>;

    async fn delete(&self, uri: &str) -> Result<(), StoreError>;

    /// Save every provided form with one shared timestamp
    async fn write_multi(&self, data: &MultiResourceWrite) -> Result<MultiResourceUris, StoreError> {
        let timestamp = Utc::now();
        let metadata = |resource_type, content_type: Option<String>| ResourceMetadata {
            timestamp,
            content_type,
            source: data.source.clone(),
            ..ResourceMetadata::new(data.url.clone(), resource_type)
        };

        let raw_meta = metadata(ResourceType::Raw, data.content_type.clone());
        let raw = self.write(&data.raw, raw_meta).await?;
        let cleaned = match &data.cleaned {
            Some(cleaned) => {
                let meta = metadata(ResourceType::Cleaned, Some("text/markdown".to_string()));
                Some(self.write(cleaned, meta).await?)
            }
            None => None,
        };
        let extracted = match &data.extracted {
            Some(extracted) => {
                let meta = ResourceMetadata {
                    extraction_prompt: data.extraction_prompt.clone(),
                    ..metadata(ResourceType::Extracted, Some("text/plain".to_string()))
                };
                Some(self.write(extracted, meta).await?)
            }
            None => None,
        };

        Ok(MultiResourceUris {
            raw,
            cleaned,
            extracted,
        })
    }

    /// Resources scraped from `url`, newest first
    async fn find_by_url(&self, url: &str) -> Result<Vec<ResourceData>, StoreError> {
        let mut found: Vec<ResourceData> = self
            .list()
            .await?
            .into_iter()
            .filter(|r| r.metadata.url == url)
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    /// Resources for `url` produced with the given extraction query
    ///
    /// With no query, only resources saved without an extraction match.
    async fn find_by_url_and_extract(
        &self,
        url: &str,
        extract: Option<&str>,
    ) -> Result<Vec<ResourceData>, StoreError> {
        let found = self.find_by_url(url).await?;
        Ok(found
            .into_iter()
            .filter(|r| r.metadata.extraction_prompt.as_deref() == extract)
            .collect())
    }
}

pub(crate) fn sort_newest_first(resources: &mut [ResourceData]) {
    resources.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));
}

/// URL with scheme dropped and everything but `[A-Za-z0-9.-]` replaced by `_`
pub(crate) fn sanitize_url(url: &str) -> String {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    without_scheme
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Render a `---` frontmatter block of `key: <json>` lines followed by the body
pub(crate) fn render_frontmatter(metadata: &ResourceMetadata, body: &str) -> Result<String, StoreError> {
    let value = serde_json::to_value(metadata).map_err(|e| StoreError::Format(e.to_string()))?;
    let mut out = String::from("---\n");
    if let Value::Object(map) = value {
        for (key, value) in map {
            out.push_str(&format!("{}: {}\n", key, value));
        }
    }
    out.push_str("---\n\n");
    out.push_str(body);
    Ok(out)
}

/// Split a frontmatter document into metadata and body
pub(crate) fn parse_frontmatter(text: &str) -> Result<(ResourceMetadata, String), StoreError> {
    let invalid = || StoreError::Format("missing resource frontmatter".to_string());
    let rest = text.strip_prefix("---\n").ok_or_else(invalid)?;
    let end = rest.find("\n---\n").ok_or_else(invalid)?;
    let header = &rest[..end];
    let body = rest[end + "\n---\n".len()..].trim_start().to_string();

    let mut map = Map::new();
    for line in header.lines() {
        if let Some((key, raw)) = line.split_once(": ") {
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            map.insert(key.to_string(), value);
        }
    }
    let metadata =
        serde_json::from_value(Value::Object(map)).map_err(|e| StoreError::Format(e.to_string()))?;
    Ok((metadata, body))
}
