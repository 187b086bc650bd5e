//! Cache store primitives backing the routing policies.
//!
//! A store is a named, persistent key-value mapping from a request
//! `Fingerprint` to a response `Snapshot`. Multiple stores coexist,
//! distinguished by name: the lifecycle controller creates and deletes
//! whole stores, the policies read and write individual entries.
//!
//! Two backends are provided:
//! - `MemoryStorage` for tests and embedded use
//! - `DiskStorage`, which survives process restarts

pub mod disk;
pub mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::net::{Fingerprint, Snapshot};

/// A single named cache store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a stored snapshot by fingerprint.
    async fn lookup(&self, key: &Fingerprint) -> Result<Option<Snapshot>>;

    /// Write a snapshot under a fingerprint.
    ///
    /// Writes are idempotent and atomic per key; when two tasks race on the
    /// same key, the last write wins.
    async fn put(&self, key: &Fingerprint, snapshot: &Snapshot) -> Result<()>;

    /// All fingerprints currently stored.
    async fn keys(&self) -> Result<Vec<Fingerprint>>;
}

/// The collection of named stores.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a store by name, creating it if absent.
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheStore>>;

    /// Look up a fingerprint across every existing store.
    /// Scan order is unspecified.
    async fn match_any(&self, key: &Fingerprint) -> Result<Option<Snapshot>>;

    /// Names of all existing stores.
    async fn names(&self) -> Result<Vec<String>>;

    /// Delete a store and everything in it. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Whether a store with this name exists.
    async fn contains(&self, name: &str) -> Result<bool>;
}
