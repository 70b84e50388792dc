use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::LocalCache;
use crate::error::{AppError, Result};

/// [`LocalCache`] persisted as a single JSON object on disk.
///
/// The whole map lives in memory and is rewritten on every mutation through a
/// temporary file and a rename, so a crash never leaves a half-written file.
/// The in-memory map only changes once the write succeeded.
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileCache {
    /// Opens the cache file, creating parent directories as needed. A missing
    /// file starts an empty cache.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!(path = ?path, "opening local cache");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::storage(format!("cannot create {}: {e}", parent.display())))?;
        }

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                AppError::storage(format!("cache file {} is corrupt: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(AppError::storage(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        debug!(entries = entries.len(), "local cache loaded");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("tmp");

        trace!(tmp_path = ?tmp_path, "writing cache to temporary file");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| AppError::storage(format!("cannot write {}: {e}", tmp_path.display())))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| AppError::storage(format!("cannot replace {}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[async_trait]
impl LocalCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut updated = entries.clone();
        updated.insert(key.to_string(), value);
        self.persist(&updated).await?;
        *entries = updated;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut updated = entries.clone();
        updated.remove(key);
        self.persist(&updated).await?;
        *entries = updated;
        Ok(())
    }
}
