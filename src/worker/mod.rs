//! The intercepting worker: lifecycle, request routing, and the two cache
//! policies.
//!
//! Every intercepted request is handled by an independently scheduled task;
//! suspension points are cache lookups, network fetches, and cache writes.
//! Concurrent requests for the same not-yet-cached key may both miss and
//! both fetch, an accepted idempotent-write race where the last write wins.

pub mod lifecycle;
pub mod router;
pub mod shell;
pub mod tiles;

pub use lifecycle::{LifecycleController, LifecycleError, WorkerState};
pub use router::Route;
pub use shell::ShellPolicy;
pub use tiles::TilePolicy;

use std::sync::Arc;

use tracing::warn;

use crate::cache::{CacheStorage, CacheStore};
use crate::config::WorkerConfig;
use crate::net::{Fetch, Fingerprint, Request, Snapshot};

/// Outcome of handling one intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The worker declines to intervene; the request proceeds unmodified.
    Bypass,
    /// The worker resolved the request with this response.
    Response(Snapshot),
    /// The fetch failed and nothing cached could stand in for it; the
    /// caller observes an unresolved fetch.
    Unresolved,
}

impl FetchOutcome {
    pub fn into_response(self) -> Option<Snapshot> {
        match self {
            FetchOutcome::Response(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Write an entry in the background. Response delivery does not wait on the
/// write; a failed write only loses the cache entry, never the response.
pub(crate) fn write_through(store: Arc<dyn CacheStore>, key: Fingerprint, snapshot: Snapshot) {
    tokio::spawn(async move {
        if let Err(e) = store.put(&key, &snapshot).await {
            warn!(key = %key, error = %e, "cache write failed");
        }
    });
}

/// The composed worker, owning the lifecycle controller and both policies.
pub struct Worker {
    config: Arc<WorkerConfig>,
    lifecycle: LifecycleController,
    tiles: TilePolicy,
    shell: ShellPolicy,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        let config = Arc::new(config);
        let lifecycle = LifecycleController::new(
            Arc::clone(&config),
            Arc::clone(&storage),
            Arc::clone(&fetcher),
        );
        let tiles = TilePolicy::new(
            Arc::clone(&config),
            Arc::clone(&storage),
            Arc::clone(&fetcher),
        );
        let shell = ShellPolicy::new(Arc::clone(&config), storage, fetcher);
        Self {
            config,
            lifecycle,
            tiles,
            shell,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    /// Populate the versioned app cache from the precache manifest.
    pub async fn install(&self) -> Result<(), LifecycleError> {
        self.lifecycle.install().await
    }

    /// Garbage-collect stale app caches and take control of consumers.
    pub async fn activate(&self) -> Result<(), LifecycleError> {
        self.lifecycle.activate().await
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.state().await
    }

    /// Handle one intercepted request.
    ///
    /// Only an activated worker intercepts; before that every request is a
    /// `Bypass`, as is every non-GET request.
    pub async fn handle(&self, request: &Request) -> FetchOutcome {
        if !self.lifecycle.state().await.can_intercept() {
            return FetchOutcome::Bypass;
        }

        match router::classify(&self.config, request) {
            None => FetchOutcome::Bypass,
            Some(Route::Tile) => FetchOutcome::Response(self.tiles.handle(request).await),
            Some(Route::Shell) => match self.shell.handle(request).await {
                Some(snapshot) => FetchOutcome::Response(snapshot),
                None => FetchOutcome::Unresolved,
            },
        }
    }
}

// ============================================================================
// Test support
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
