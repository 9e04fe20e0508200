//! Dedup stores: the record of what has already been republished
//!
//! Two interchangeable implementations exist. Which one a deployment uses is
//! decided once, from configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::{Config, StoreKind};
use crate::error::{RepostError, Result, StoreError};
use crate::platforms::facebook::FacebookPage;
use crate::platforms::graph::GraphClient;
use crate::types::DedupKey;

#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Snapshot of every key known to be published
    async fn load(&self) -> Result<HashSet<String>>;

    /// Mark a key as published
    async fn record(&self, key: &str) -> Result<()>;

    /// Which candidate field this store keys on
    fn key_policy(&self) -> DedupKey;

    fn describe(&self) -> String;
}

/// Append-only file with one URL per line
///
/// A single writer is assumed; there is no file locking.
pub struct LocalLogStore {
    path: PathBuf,
}

impl LocalLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> RepostError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
        .into()
    }
}

#[async_trait]
impl DedupStore for LocalLogStore {
    async fn load(&self) -> Result<HashSet<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No dedup log at {}, starting empty", self.path.display());
                return Ok(HashSet::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn record(&self, key: &str) -> Result<()> {
        if key.contains(['\n', '\r']) {
            return Err(RepostError::InvalidInput(format!(
                "dedup key contains a line break: {:?}",
                key
            )));
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        file.write_all(format!("{}\n", key).as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;
        file.sync_data().await.map_err(|e| self.io_error(e))?;

        debug!("Recorded {} in {}", key, self.path.display());
        Ok(())
    }

    fn key_policy(&self) -> DedupKey {
        DedupKey::Url
    }

    fn describe(&self) -> String {
        format!("local log {}", self.path.display())
    }
}

/// Captions of the Page's most recent posts
///
/// Publishing creates the history entry, so [`record`](DedupStore::record)
/// does nothing.
pub struct RemoteHistoryStore {
    page: FacebookPage,
    limit: usize,
}

impl RemoteHistoryStore {
    pub fn new(page: FacebookPage, limit: usize) -> Self {
        Self { page, limit }
    }
}

#[async_trait]
impl DedupStore for RemoteHistoryStore {
    async fn load(&self) -> Result<HashSet<String>> {
        let captions = self
            .page
            .recent_captions(self.limit)
            .await
            .map_err(|e| match e {
                RepostError::Platform(platform) => StoreError::History(platform).into(),
                other => other,
            })?;
        Ok(captions.into_iter().collect())
    }

    async fn record(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn key_policy(&self) -> DedupKey {
        DedupKey::Title
    }

    fn describe(&self) -> String {
        format!(
            "remote history of page {} (last {})",
            self.page.page_id(),
            self.limit
        )
    }
}

/// Build the configured store
pub fn create_store(config: &Config) -> Result<Box<dyn DedupStore>> {
    match config.settings.dedup.store {
        StoreKind::Local => Ok(Box::new(LocalLogStore::new(config.settings.log_path()?))),
        StoreKind::Remote => {
            let graph = Arc::new(GraphClient::from_config(config)?);
            let page = FacebookPage::new(graph, config.credentials.fb_page_id.clone());
            Ok(Box::new(RemoteHistoryStore::new(
                page,
                config.settings.dedup.history_limit,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalLogStore::new(dir.path().join("published.log"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_then_load() {
        let dir = TempDir::new().unwrap();
        let store = LocalLogStore::new(dir.path().join("published.log"));

        store.record("http://x/a.jpg").await.unwrap();
        store.record("http://x/b.png").await.unwrap();

        let known = store.load().await.unwrap();
        assert_eq!(known.len(), 2);
        assert!(known.contains("http://x/a.jpg"));
        assert!(known.contains("http://x/b.png"));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "http://x/a.jpg\nhttp://x/b.png\n");
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = LocalLogStore::new(dir.path().join("published.log"));
        store.record("http://x/a.jpg").await.unwrap();

        let first = store.load().await.unwrap();
        let second = store.load().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_load_skips_blank_lines_and_whitespace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("published.log");
        std::fs::write(&path, "http://x/a.jpg\n\n  http://x/b.jpg  \r\n").unwrap();

        let known = LocalLogStore::new(&path).load().await.unwrap();
        assert_eq!(known.len(), 2);
        assert!(known.contains("http://x/b.jpg"));
    }

    #[tokio::test]
    async fn test_record_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = LocalLogStore::new(dir.path().join("nested/deeper/published.log"));
        store.record("http://x/a.jpg").await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_record_rejects_line_breaks() {
        let dir = TempDir::new().unwrap();
        let store = LocalLogStore::new(dir.path().join("published.log"));
        let err = store.record("http://x/a.jpg\nhttp://x/b.jpg").await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_unreadable_path_is_store_error() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be read as a file
        let store = LocalLogStore::new(dir.path());
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, RepostError::Store(StoreError::Io { .. })));
    }

    #[test]
    fn test_local_store_keys_on_url() {
        assert_eq!(LocalLogStore::new("/tmp/x").key_policy(), DedupKey::Url);
    }
}
