//! Markdown-file strategy config

use super::table::{generate_markdown_table, parse_markdown_table, DEFAULT_CONFIG};
use super::{StrategyConfigEntry, StrategyConfigStore};
use crate::error::StoreError;
use async_trait::async_trait;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info};

/// File name used under the default config directory
pub const DEFAULT_CONFIG_FILE: &str = "scraping-strategies.md";

/// Strategy config persisted as a markdown table on disk
#[derive(Debug, Clone)]
pub struct FilesystemStrategyConfigStore {
    path: PathBuf,
}

impl FilesystemStrategyConfigStore {
    /// Store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<temp dir>/pulsefetch/scraping-strategies.md`
    pub fn with_default_path() -> Self {
        Self::new(default_config_path())
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the built-in config if the file does not exist yet
    ///
    /// Never replaces a file another writer created in the meantime.
    async fn ensure_exists(&self) -> Result<(), StoreError> {
        if fs::try_exists(&self.path).await? {
            return Ok(());
        }
        info!(path = %self.path.display(), "Creating strategy config");
        self.write_atomic(DEFAULT_CONFIG, false).await
    }

    /// Write through a private temp file in the target directory, then rename
    ///
    /// With `overwrite` unset an existing target is left untouched.
    async fn write_atomic(&self, contents: &str, overwrite: bool) -> Result<(), StoreError> {
        let path = self.path.clone();
        let contents = contents.to_string();
        tokio::task::spawn_blocking(move || persist(&path, &contents, overwrite))
            .await
            .map_err(io::Error::other)??;
        Ok(())
    }
}

fn persist(path: &Path, contents: &str, overwrite: bool) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;

    let persisted = if overwrite {
        tmp.persist(path)
    } else {
        tmp.persist_noclobber(path)
    };
    match persisted {
        Ok(_) => Ok(()),
        Err(e) if !overwrite && e.error.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e.error),
    }
}

impl Default for FilesystemStrategyConfigStore {
    fn default() -> Self {
        Self::with_default_path()
    }
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    std::env::temp_dir()
        .join("pulsefetch")
        .join(DEFAULT_CONFIG_FILE)
}

#[async_trait]
impl StrategyConfigStore for FilesystemStrategyConfigStore {
    async fn load_config(&self) -> Result<Vec<StrategyConfigEntry>, StoreError> {
        self.ensure_exists().await?;
        let text = fs::read_to_string(&self.path).await?;
        let entries = parse_markdown_table(&text)?;
        debug!(path = %self.path.display(), entries = entries.len(), "Loaded strategy config");
        Ok(entries)
    }

    async fn save_config(&self, entries: &[StrategyConfigEntry]) -> Result<(), StoreError> {
        self.write_atomic(&generate_markdown_table(entries), true).await
    }
}
