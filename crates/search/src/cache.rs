//! Byte-level persistence for derived indexes.
//!
//! A cache miss and an unreadable entry look the same to callers: both read
//! as `None` and lead to a rebuild. Only writes report failure.

use crate::error::{Result, SearchError};
use async_trait::async_trait;
use fs2::FileExt;
use sage_vector_store::safe_component;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Stored bytes for `key`, or `None` when absent or unreadable.
    async fn read(&self, key: &str) -> Option<Vec<u8>>;

    /// Replaces the entry for `key`. Readers never observe a partial entry.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// One file per key under a directory: `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_component(key)))
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn read(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                log::warn!("Failed to read cache entry {}: {err}", path.display());
                None
            }
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || write_locked(&path, &bytes))
            .await
            .map_err(|err| SearchError::CacheError(format!("join cache write task: {err}")))?
    }
}

/// Writes under an exclusive per-key lock, then renames into place.
fn write_locked(path: &Path, bytes: &[u8]) -> Result<()> {
    let lock_path = path.with_extension("lock");
    let lock = std::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|err| {
            SearchError::CacheError(format!("open cache lock {}: {err}", lock_path.display()))
        })?;
    lock.lock_exclusive().map_err(|err| {
        SearchError::CacheError(format!("acquire cache lock {}: {err}", lock_path.display()))
    })?;

    let tmp = path.with_extension("json.tmp");
    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    let _ = lock.unlock();

    result.map_err(|err| {
        let _ = std::fs::remove_file(&tmp);
        SearchError::CacheError(format!("write cache entry {}: {err}", path.display()))
    })
}

/// Process-local cache, mostly for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn read(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_store_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileCacheStore::new(tmp.path().join("cache").join("bm25"));

        assert_eq!(store.read("rules").await, None);
        store.write("rules", b"{\"a\":1}").await.unwrap();
        assert_eq!(store.read("rules").await, Some(b"{\"a\":1}".to_vec()));

        store.write("rules", b"{}").await.unwrap();
        assert_eq!(store.read("rules").await, Some(b"{}".to_vec()));
        assert!(!store.path_for("rules").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_sanitizes_keys() {
        let tmp = TempDir::new().unwrap();
        let store = FileCacheStore::new(tmp.path());
        let path = store.path_for("../escape/attempt");
        assert_eq!(path.parent(), Some(tmp.path()));

        store.write("../escape/attempt", b"x").await.unwrap();
        assert_eq!(store.read("../escape/attempt").await, Some(b"x".to_vec()));
    }

    #[tokio::test]
    async fn unreadable_entry_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileCacheStore::new(tmp.path());
        std::fs::create_dir_all(store.path_for("dir-entry")).unwrap();
        assert_eq!(store.read("dir-entry").await, None);
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryCacheStore::new();
        assert!(store.is_empty());
        assert_eq!(store.read("k").await, None);
        store.write("k", b"v").await.unwrap();
        assert_eq!(store.read("k").await, Some(b"v".to_vec()));
        assert_eq!(store.len(), 1);
    }
}
