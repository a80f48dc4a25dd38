//! Markdown-file resource storage
//!
//! Layout: `<root>/<raw|cleaned|extracted>/<sanitized-url>_<timestamp>_<seq>.md`.
//! Each file is a frontmatter block of `key: <json>` lines and the body.

use super::{
    parse_frontmatter, render_frontmatter, sanitize_url, sort_newest_first, ResourceContent,
    ResourceData, ResourceMetadata, ResourceStorage, ResourceType,
};
use crate::error::StoreError;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const URI_PREFIX: &str = "file://";

/// Distinguishes resources written within the same millisecond
static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

const MAX_NAME_ATTEMPTS: usize = 16;

/// Resources persisted as markdown files under a root directory
#[derive(Debug, Clone)]
pub struct FilesystemResourceStorage {
    root: PathBuf,
}

impl FilesystemResourceStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage under `<temp dir>/pulsefetch/resources`
    pub fn with_default_root() -> Self {
        Self::new(std::env::temp_dir().join("pulsefetch").join("resources"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn init(&self) -> Result<(), StoreError> {
        for resource_type in ResourceType::ALL {
            fs::create_dir_all(self.root.join(resource_type.as_str())).await?;
        }
        Ok(())
    }

    /// Map a URI back to a file, refusing paths outside the root
    fn uri_to_path(&self, uri: &str) -> Result<PathBuf, StoreError> {
        let invalid = || StoreError::InvalidUri(uri.to_string());
        let path = Path::new(uri.strip_prefix(URI_PREFIX).ok_or_else(invalid)?);
        let escapes = path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes || !path.starts_with(&self.root) {
            return Err(invalid());
        }
        Ok(path.to_path_buf())
    }

    async fn read_entry(
        &self,
        resource_type: ResourceType,
        path: &Path,
    ) -> Result<ResourceData, StoreError> {
        let text = fs::read_to_string(path).await?;
        let (mut metadata, _) = parse_frontmatter(&text)?;
        metadata.resource_type = resource_type;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(ResourceData::from_metadata(
            format!("{}{}", URI_PREFIX, path.display()),
            format!("{}/{}", resource_type, stem),
            metadata,
        ))
    }
}

impl Default for FilesystemResourceStorage {
    fn default() -> Self {
        Self::with_default_root()
    }
}

fn file_name(metadata: &ResourceMetadata, seq: u64) -> String {
    format!(
        "{}_{}_{:04}.md",
        sanitize_url(&metadata.url),
        metadata.timestamp.format("%Y-%m-%d_%H%M%S%3f"),
        seq % 10_000
    )
}

#[async_trait]
impl ResourceStorage for FilesystemResourceStorage {
    async fn list(&self) -> Result<Vec<ResourceData>, StoreError> {
        self.init().await?;
        let mut resources = Vec::new();

        for resource_type in ResourceType::ALL {
            let mut dir = fs::read_dir(self.root.join(resource_type.as_str())).await?;
            while let Some(entry) = dir.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                match self.read_entry(resource_type, &path).await {
                    Ok(data) => resources.push(data),
                    Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable resource"),
                }
            }
        }

        sort_newest_first(&mut resources);
        Ok(resources)
    }

    async fn read(&self, uri: &str) -> Result<ResourceContent, StoreError> {
        let path = self.uri_to_path(uri)?;
        if !fs::try_exists(&path).await? {
            return Err(StoreError::NotFound(uri.to_string()));
        }
        let text = fs::read_to_string(&path).await?;
        let (metadata, body) = parse_frontmatter(&text)?;
        Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type: metadata
                .content_type
                .unwrap_or_else(|| "text/plain".to_string()),
            text: body,
        })
    }

    async fn write(&self, content: &str, metadata: ResourceMetadata) -> Result<String, StoreError> {
        self.init().await?;
        let dir = self.root.join(metadata.resource_type.as_str());
        let rendered = render_frontmatter(&metadata, content)?;

        let mut attempts = 0;
        let (path, mut file) = loop {
            let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
            let path = dir.join(file_name(&metadata, seq));
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e)
                    if e.kind() == io::ErrorKind::AlreadyExists && attempts < MAX_NAME_ATTEMPTS =>
                {
                    attempts += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };
        file.write_all(rendered.as_bytes()).await?;
        file.flush().await?;
        debug!(path = %path.display(), "Saved resource");
        Ok(format!("{}{}", URI_PREFIX, path.display()))
    }

    async fn exists(&self, uri: &str) -> Result<bool, StoreError> {
        let path = self.uri_to_path(uri)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn delete(&self, uri: &str) -> Result<(), StoreError> {
        let path = self.uri_to_path(uri)?;
        if !fs::try_exists(&path).await? {
            return Err(StoreError::NotFound(uri.to_string()));
        }
        fs::remove_file(&path).await?;
        Ok(())
    }
}
