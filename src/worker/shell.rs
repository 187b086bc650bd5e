//! Generic resource policy: cache-first with network fallback.
//!
//! Handles every GET the router does not send to the tile policy. Fresh
//! 200 responses are written back to the current versioned app cache, so
//! resources picked up after install still survive offline until the next
//! deployment sweeps that cache.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::write_through;
use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::net::{Fetch, Request, Snapshot};

pub struct ShellPolicy {
    config: Arc<WorkerConfig>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetch>,
}

impl ShellPolicy {
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

    /// Resolve a non-tile GET.
    ///
    /// `None` means the fetch failed and nothing cached could stand in for
    /// it; the caller observes an unresolved fetch and must handle the
    /// missing resource itself.
    pub async fn handle(&self, request: &Request) -> Option<Snapshot> {
        let key = request.fingerprint();

        match self.storage.match_any(&key).await {
            Ok(Some(cached)) => {
                debug!(url = %request.url, "served from cache");
                return Some(cached);
            }
            Ok(None) => {}
            // A lookup failure is a miss, not an error.
            Err(e) => warn!(url = %request.url, error = %e, "cache lookup failed"),
        }

        match self.fetcher.fetch(request).await {
            Ok(snapshot) => {
                // Non-200 responses pass through unmodified and are never
                // persisted.
                if snapshot.status == 200 {
                    match self.storage.open(&self.config.app_cache).await {
                        Ok(store) => write_through(store, key, snapshot.clone()),
                        Err(e) => {
                            warn!(store = %self.config.app_cache, error = %e, "app cache unavailable")
                        }
                    }
                }
                Some(snapshot)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "fetch failed");
                self.offline_fallback(request).await
            }
        }
    }

    /// Best-effort offline shell for page navigations.
    ///
    /// The `Accept` header may be absent from a request that reaches this
    /// path; its presence is checked before its content is tested.
    async fn offline_fallback(&self, request: &Request) -> Option<Snapshot> {
        let expects_html = request
            .header("accept")
            .is_some_and(|accept| accept.contains("text/html"));
        if !expects_html {
            return None;
        }

        let index_key = Request::get(self.config.index_url.clone()).fingerprint();
        match self.storage.match_any(&index_key).await {
            Ok(Some(index)) => {
                info!(url = %request.url, "offline navigation, serving cached index");
                Some(index)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "index lookup failed");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
