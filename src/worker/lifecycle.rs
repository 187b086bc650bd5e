//! Install/activate lifecycle of the worker.
//!
//! Transitions are driven externally by the hosting runtime when it detects
//! a new version of the worker. Install populates the versioned app cache
//! from the precache manifest; activate garbage-collects every cache store
//! that is neither the current app cache nor the tile cache. That sweep is
//! the sole eviction mechanism for app-shell content (there is no TTL or
//! size-based eviction) and it never touches the tile cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::net::{Fetch, FetchError, Request};

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Precaching the app shell.
    Installing,
    /// Install finished; waiting to activate.
    Installed,
    /// Sweeping stale caches.
    Activating,
    /// Intercepting requests.
    Activated,
    /// Install failed; this version will never activate.
    Redundant,
}

impl WorkerState {
    /// Only an activated worker intercepts fetches.
    pub fn can_intercept(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Redundant)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid lifecycle transition: expected {expected}, state is {actual}")]
    InvalidState {
        expected: &'static str,
        actual: WorkerState,
    },

    #[error("Failed to precache {url}")]
    Precache {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Precache of {url} returned status {status}")]
    PrecacheStatus { url: String, status: u16 },

    #[error("Cache storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Governs the installed/activated state transitions of the worker itself.
pub struct LifecycleController {
    config: Arc<WorkerConfig>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetch>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    claimed: AtomicBool,
}

impl LifecycleController {
    pub fn new(
        config: Arc<WorkerConfig>,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            config,
            storage,
            fetcher,
            state: RwLock::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether this version asked to skip the waiting hold-off after a
    /// successful install.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Whether active consumers have been claimed by this version.
    pub fn controls_clients(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    /// Populate the app cache from the precache manifest.
    ///
    /// Install is atomic from the caller's perspective: it does not return
    /// `Ok` until every manifest URL is fetched and stored, and any single
    /// failure fails the whole step. A failed install leaves every existing
    /// store untouched and marks this version redundant; the prior version
    /// keeps serving.
    pub async fn install(&self) -> Result<(), LifecycleError> {
        self.expect_state(WorkerState::Installing, "installing").await?;

        info!(store = %self.config.app_cache, "installing: precaching app shell");
        match self.populate_app_cache().await {
            Ok(count) => {
                // Eligible for activation without waiting for consumers to
                // close.
                self.skip_waiting.store(true, Ordering::SeqCst);
                *self.state.write().await = WorkerState::Installed;
                info!(store = %self.config.app_cache, entries = count, "install complete");
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = WorkerState::Redundant;
                Err(e)
            }
        }
    }

    /// Fetch every manifest URL, then store them all.
    ///
    /// Nothing is written until every fetch has succeeded with status 200,
    /// so a failed install cannot leave a partially populated app cache.
    async fn populate_app_cache(&self) -> Result<usize, LifecycleError> {
        let fetches = self.config.precache.iter().map(|url| {
            let fetcher = Arc::clone(&self.fetcher);
            async move {
                let request = Request::get(url.clone());
                let snapshot =
                    fetcher
                        .fetch(&request)
                        .await
                        .map_err(|source| LifecycleError::Precache {
                            url: url.clone(),
                            source,
                        })?;
                if snapshot.status != 200 {
                    return Err(LifecycleError::PrecacheStatus {
                        url: url.clone(),
                        status: snapshot.status,
                    });
                }
                Ok((request.fingerprint(), snapshot))
            }
        });

        let entries = try_join_all(fetches).await?;

        let store = self.storage.open(&self.config.app_cache).await?;
        for (key, snapshot) in &entries {
            store.put(key, snapshot).await?;
        }
        Ok(entries.len())
    }

    /// Sweep stale caches, then claim active consumers.
    ///
    /// Every store whose name is neither the current app cache nor the tile
    /// cache is deleted. Per-store deletion failures are logged and skipped;
    /// the sweep always runs to completion before consumers are claimed, so
    /// no consumer is ever served by a policy pointed at a store about to be
    /// deleted.
    pub async fn activate(&self) -> Result<(), LifecycleError> {
        self.expect_state(WorkerState::Installed, "installed").await?;
        *self.state.write().await = WorkerState::Activating;

        let names = self.storage.names().await?;
        for name in names {
            if name == self.config.app_cache || name == self.config.tile_cache {
                continue;
            }
            match self.storage.delete(&name).await {
                Ok(true) => info!(store = %name, "removed stale cache"),
                Ok(false) => {}
                Err(e) => warn!(store = %name, error = %e, "failed to delete stale cache"),
            }
        }

        self.claimed.store(true, Ordering::SeqCst);
        *self.state.write().await = WorkerState::Activated;
        info!("activation complete");
        Ok(())
    }

    async fn expect_state(
        &self,
        expected: WorkerState,
        label: &'static str,
    ) -> Result<(), LifecycleError> {
        let actual = self.state().await;
        if actual != expected {
            return Err(LifecycleError::InvalidState {
                expected: label,
                actual,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::net::Snapshot;
    use crate::worker::testing::{ok_snapshot, test_config, ScriptedFetch};

    fn controller(
        storage: Arc<MemoryStorage>,
        fetcher: ScriptedFetch,
    ) -> LifecycleController {
        LifecycleController::new(
            Arc::new(test_config()),
            storage as Arc<dyn CacheStorage>,
            Arc::new(fetcher),
        )
    }

    fn manifest_fetch() -> ScriptedFetch {
        ScriptedFetch::new()
            .respond("https://app.test/", ok_snapshot(b"<html>root</html>"))
            .respond("https://app.test/index.html", ok_snapshot(b"<html>index</html>"))
    }

    #[tokio::test]
    async fn test_install_populates_app_cache() {
        let storage = Arc::new(MemoryStorage::new());
        let lifecycle = controller(Arc::clone(&storage), manifest_fetch());

        lifecycle.install().await.unwrap();

        assert_eq!(lifecycle.state().await, WorkerState::Installed);
        assert!(lifecycle.skip_waiting_requested());

        let store = storage.open("trails-app-v2").await.unwrap();
        assert_eq!(store.keys().await.unwrap().len(), 2);

        // Stored snapshots are byte-identical to what the network returned.
        let index = Request::get("https://app.test/index.html").fingerprint();
        let cached = store.lookup(&index).await.unwrap().unwrap();
        assert_eq!(cached.body, b"<html>index</html>");
    }

    #[tokio::test]
    async fn test_install_fails_when_manifest_url_unreachable() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = ScriptedFetch::new()
            .respond("https://app.test/", ok_snapshot(b"root"))
            .offline("https://app.test/index.html");
        let lifecycle = controller(Arc::clone(&storage), fetcher);

        let err = lifecycle.install().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Precache { .. }));
        assert_eq!(lifecycle.state().await, WorkerState::Redundant);
        assert!(!lifecycle.skip_waiting_requested());

        // Nothing was written for the failed version.
        assert!(!storage.contains("trails-app-v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_install_fails_on_non_200_manifest_entry() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = ScriptedFetch::new()
            .respond("https://app.test/", ok_snapshot(b"root"))
            .respond(
                "https://app.test/index.html",
                Snapshot::new(503, Vec::new(), Vec::new()),
            );
        let lifecycle = controller(Arc::clone(&storage), fetcher);

        let err = lifecycle.install().await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::PrecacheStatus { status: 503, .. }
        ));
        assert_eq!(lifecycle.state().await, WorkerState::Redundant);
    }

    #[tokio::test]
    async fn test_failed_install_leaves_prior_version_untouched() {
        let storage = Arc::new(MemoryStorage::new());
        let prior = storage.open("trails-app-v1").await.unwrap();
        let key = Request::get("https://app.test/").fingerprint();
        prior.put(&key, &ok_snapshot(b"old shell")).await.unwrap();

        let fetcher = ScriptedFetch::new().offline("https://app.test/");
        let lifecycle = controller(Arc::clone(&storage), fetcher);
        assert!(lifecycle.install().await.is_err());

        let prior = storage.open("trails-app-v1").await.unwrap();
        assert_eq!(
            prior.lookup(&key).await.unwrap().unwrap().body,
            b"old shell"
        );
    }

    #[tokio::test]
    async fn test_install_twice_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let lifecycle = controller(storage, manifest_fetch());

        lifecycle.install().await.unwrap();
        let err = lifecycle.install().await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_activate_sweeps_stale_caches_and_keeps_tiles() {
        let storage = Arc::new(MemoryStorage::new());

        // A stale deployment and a populated tile cache both pre-exist.
        storage.open("trails-app-v1").await.unwrap();
        let tiles = storage.open("trails-tiles-v1").await.unwrap();
        let tile_key = Request::get("https://tiles.test/tiles/14/1/2.png").fingerprint();
        tiles.put(&tile_key, &ok_snapshot(b"tile")).await.unwrap();

        let lifecycle = controller(Arc::clone(&storage), manifest_fetch());
        lifecycle.install().await.unwrap();
        lifecycle.activate().await.unwrap();

        assert_eq!(lifecycle.state().await, WorkerState::Activated);
        assert!(lifecycle.controls_clients());

        assert!(!storage.contains("trails-app-v1").await.unwrap());
        assert!(storage.contains("trails-app-v2").await.unwrap());
        assert!(storage.contains("trails-tiles-v1").await.unwrap());

        // The tile cache kept its entries through the sweep.
        let tiles = storage.open("trails-tiles-v1").await.unwrap();
        assert!(tiles.lookup(&tile_key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_activate_requires_installed_state() {
        let storage = Arc::new(MemoryStorage::new());
        let lifecycle = controller(storage, manifest_fetch());

        let err = lifecycle.activate().await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState { .. }));
        assert!(!lifecycle.controls_clients());
    }

    #[test]
    fn test_state_predicates() {
        assert!(WorkerState::Activated.can_intercept());
        assert!(!WorkerState::Installed.can_intercept());
        assert!(WorkerState::Redundant.is_terminal());
        assert!(!WorkerState::Activating.is_terminal());
        assert_eq!(WorkerState::Installing.to_string(), "installing");
    }
}
