//! Durable cache storage backed by the filesystem.
//!
//! Each store is a directory under the storage root; each entry is one JSON
//! file holding the fingerprint and snapshot, named by the SHA-256 digest of
//! the fingerprint. Entries written here survive process restarts, which is
//! what makes tile retention across app deployments meaningful.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{CacheStore, CacheStorage};
use crate::net::{Fingerprint, Snapshot};

#[derive(Serialize, Deserialize)]
struct DiskEntry {
    fingerprint: Fingerprint,
    snapshot: Snapshot,
}

fn entry_file_name(key: &Fingerprint) -> String {
    let digest = Sha256::digest(key.to_string().as_bytes());
    format!("{}.json", hex::encode(digest))
}

/// Filesystem-backed store collection rooted at a single directory.
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create cache root: {}", root.display()))?;
        Ok(Self { root })
    }

    fn store_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// A single store directory.
pub struct DiskStore {
    dir: PathBuf,
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn lookup(&self, key: &Fingerprint) -> Result<Option<Snapshot>> {
        let path = self.dir.join(entry_file_name(key));
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache entry: {}", path.display()))?;
        let entry: DiskEntry = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache entry: {}", path.display()))?;

        Ok(Some(entry.snapshot))
    }

    async fn put(&self, key: &Fingerprint, snapshot: &Snapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create store: {}", self.dir.display()))?;

        let entry = DiskEntry {
            fingerprint: key.clone(),
            snapshot: snapshot.clone(),
        };
        let path = self.dir.join(entry_file_name(key));
        let contents = serde_json::to_string(&entry)?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write cache entry: {}", path.display()))?;

        debug!(key = %key, path = %path.display(), "cache entry written");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<Fingerprint>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list store: {}", self.dir.display()))?
        {
            let path = dir_entry?.path();
            if path.extension().map(|e| e == "json") != Some(true) {
                continue;
            }
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read cache entry: {}", path.display()))?;
            let entry: DiskEntry = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse cache entry: {}", path.display()))?;
            keys.push(entry.fingerprint);
        }
        Ok(keys)
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheStore>> {
        let dir = self.store_dir(name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store: {}", dir.display()))?;
        Ok(Arc::new(DiskStore { dir }))
    }

    async fn match_any(&self, key: &Fingerprint) -> Result<Option<Snapshot>> {
        for name in self.names().await? {
            let store = self.open(&name).await?;
            if let Some(snapshot) = store.lookup(key).await? {
                return Ok(Some(snapshot));
            }
        }
        Ok(None)
    }

    async fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for dir_entry in fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list cache root: {}", self.root.display()))?
        {
            let dir_entry = dir_entry?;
            if dir_entry.file_type()?.is_dir() {
                names.push(dir_entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let dir = self.store_dir(name);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .with_context(|| format!("Failed to delete store: {}", dir.display()))?;
        debug!(store = name, "store deleted");
        Ok(true)
    }

    async fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.store_dir(name).exists())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Request;

    fn tile_key() -> Fingerprint {
        Request::get("https://example.com/tiles/14/1/2.png").fingerprint()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path()).unwrap();
        let store = storage.open("tiles").await.unwrap();

        let snapshot = Snapshot::new(
            200,
            vec![("content-type".to_string(), "image/png".to_string())],
            b"tile bytes".to_vec(),
        );
        store.put(&tile_key(), &snapshot).await.unwrap();

        assert_eq!(store.lookup(&tile_key()).await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::new(200, Vec::new(), b"tile".to_vec());

        {
            let storage = DiskStorage::new(dir.path()).unwrap();
            let store = storage.open("tiles").await.unwrap();
            store.put(&tile_key(), &snapshot).await.unwrap();
        }

        let storage = DiskStorage::new(dir.path()).unwrap();
        assert!(storage.contains("tiles").await.unwrap());
        let store = storage.open("tiles").await.unwrap();
        assert_eq!(store.lookup(&tile_key()).await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path()).unwrap();
        let store = storage.open("tiles").await.unwrap();
        let snapshot = Snapshot::new(200, Vec::new(), b"tile".to_vec());

        store.put(&tile_key(), &snapshot).await.unwrap();
        store.put(&tile_key(), &snapshot).await.unwrap();

        let keys = store.keys().await.unwrap();
        assert_eq!(keys, vec![tile_key()]);
    }

    #[tokio::test]
    async fn test_delete_store() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path()).unwrap();
        let store = storage.open("app-v1").await.unwrap();
        store
            .put(&tile_key(), &Snapshot::new(200, Vec::new(), Vec::new()))
            .await
            .unwrap();

        assert!(storage.delete("app-v1").await.unwrap());
        assert!(!storage.contains("app-v1").await.unwrap());
        assert!(!storage.delete("app-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_match_any_across_stores() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path()).unwrap();
        storage.open("app-v1").await.unwrap();
        let tiles = storage.open("tiles").await.unwrap();

        let snapshot = Snapshot::new(200, Vec::new(), b"tile".to_vec());
        tiles.put(&tile_key(), &snapshot).await.unwrap();

        assert_eq!(storage.match_any(&tile_key()).await.unwrap(), Some(snapshot));
    }
}
