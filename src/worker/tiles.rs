//! Tile cache policy: cache-first, perpetual-write, no eviction.
//!
//! Tiles are treated as immutable once fetched: a hit is returned verbatim
//! with no freshness check, and nothing the lifecycle controller does ever
//! purges the tile cache. The store grows without bound; the platform's
//! storage quota is the only backstop.

use std::sync::Arc;

use tracing::{debug, warn};

use super::write_through;
use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::net::{Fetch, Request, Snapshot};

pub struct TilePolicy {
    config: Arc<WorkerConfig>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetch>,
}

impl TilePolicy {
    pub fn new(
        config: Arc<WorkerConfig>,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            config,
            storage,
            fetcher,
        }
    }

    /// Resolve a tile request.
    ///
    /// Always yields a response: the cached tile, the network response, or a
    /// synthetic not-found when offline with nothing cached. The map
    /// renderer treats the 404 as "tile unavailable", never as a failure.
    pub async fn handle(&self, request: &Request) -> Snapshot {
        let key = request.fingerprint();

        let store = match self.storage.open(&self.config.tile_cache).await {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(store = %self.config.tile_cache, error = %e, "tile cache unavailable");
                None
            }
        };

        if let Some(store) = &store {
            match store.lookup(&key).await {
                Ok(Some(cached)) => {
                    debug!(url = %request.url, "tile served from cache");
                    return cached;
                }
                Ok(None) => {}
                // A lookup failure is a miss, not an error.
                Err(e) => warn!(url = %request.url, error = %e, "tile lookup failed"),
            }
        }

        match self.fetcher.fetch(request).await {
            Ok(snapshot) => {
                // Only exact success is persisted; transient error and
                // redirect payloads must never become permanent tiles.
                if snapshot.status == 200 {
                    if let Some(store) = store {
                        write_through(store, key, snapshot.clone());
                    }
                }
                snapshot
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "tile fetch failed, responding not-found");
                Snapshot::not_found()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
