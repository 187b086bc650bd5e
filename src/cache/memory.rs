//! In-memory cache storage.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheStore, CacheStorage};
use crate::net::{Fingerprint, Snapshot};

/// A store-of-stores held entirely in memory.
#[derive(Default)]
pub struct MemoryStorage {
    stores: RwLock<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A single in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Fingerprint, Snapshot>>,
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn lookup(&self, key: &Fingerprint) -> Result<Option<Snapshot>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &Fingerprint, snapshot: &Snapshot) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.clone(), snapshot.clone());
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<Fingerprint>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheStore>> {
        let mut stores = self.stores.write().await;
        let store = stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::default()));
        Ok(Arc::clone(store) as Arc<dyn CacheStore>)
    }

    async fn match_any(&self, key: &Fingerprint) -> Result<Option<Snapshot>> {
        let stores = self.stores.read().await;
        for store in stores.values() {
            if let Some(snapshot) = store.lookup(key).await? {
                return Ok(Some(snapshot));
            }
        }
        Ok(None)
    }

    async fn names(&self) -> Result<Vec<String>> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.stores.write().await.remove(name).is_some())
    }

    async fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.stores.read().await.contains_key(name))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Method, Request};

    fn tile_key() -> Fingerprint {
        Request::get("https://example.com/tiles/14/1/2.png").fingerprint()
    }

    #[tokio::test]
    async fn test_open_creates_lazily() {
        let storage = MemoryStorage::new();
        assert!(!storage.contains("app-v1").await.unwrap());

        storage.open("app-v1").await.unwrap();
        assert!(storage.contains("app-v1").await.unwrap());
        assert_eq!(storage.names().await.unwrap(), vec!["app-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_open_twice_shares_entries() {
        let storage = MemoryStorage::new();
        let first = storage.open("app-v1").await.unwrap();
        let second = storage.open("app-v1").await.unwrap();

        let snapshot = Snapshot::new(200, Vec::new(), b"shell".to_vec());
        first.put(&tile_key(), &snapshot).await.unwrap();

        assert_eq!(second.lookup(&tile_key()).await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let storage = MemoryStorage::new();
        let store = storage.open("tiles").await.unwrap();
        let snapshot = Snapshot::new(200, Vec::new(), b"tile".to_vec());

        store.put(&tile_key(), &snapshot).await.unwrap();
        store.put(&tile_key(), &snapshot).await.unwrap();

        assert_eq!(store.keys().await.unwrap().len(), 1);
        assert_eq!(store.lookup(&tile_key()).await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_match_any_searches_every_store() {
        let storage = MemoryStorage::new();
        storage.open("app-v1").await.unwrap();
        let tiles = storage.open("tiles").await.unwrap();

        let snapshot = Snapshot::new(200, Vec::new(), b"tile".to_vec());
        tiles.put(&tile_key(), &snapshot).await.unwrap();

        assert_eq!(storage.match_any(&tile_key()).await.unwrap(), Some(snapshot));

        let missing = Fingerprint::new(Method::Get, "https://example.com/missing");
        assert_eq!(storage.match_any(&missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_removes_store_and_entries() {
        let storage = MemoryStorage::new();
        let store = storage.open("app-v1").await.unwrap();
        let snapshot = Snapshot::new(200, Vec::new(), b"shell".to_vec());
        store.put(&tile_key(), &snapshot).await.unwrap();

        assert!(storage.delete("app-v1").await.unwrap());
        assert!(!storage.contains("app-v1").await.unwrap());
        assert_eq!(storage.match_any(&tile_key()).await.unwrap(), None);

        // Deleting a store that never existed reports false.
        assert!(!storage.delete("app-v0").await.unwrap());
    }
}
