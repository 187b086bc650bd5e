//! Request classification.

use crate::config::WorkerConfig;
use crate::net::Request;

/// The policy that will resolve a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Map-tile resource: cache-first against the persistent tile cache.
    Tile,
    /// Anything else: cache-first against the versioned app cache.
    Shell,
}

/// Classify one intercepted request.
///
/// `None` means the worker declines to intervene: no caching semantics
/// apply to non-idempotent methods, so anything but GET passes through
/// unmodified. Classification is a pure string match on the URL; exactly
/// one policy handles each qualifying request.
pub fn classify(config: &WorkerConfig, request: &Request) -> Option<Route> {
    if !request.method.is_get() {
        return None;
    }
    if request.url.contains(&config.tile_pattern) {
        Some(Route::Tile)
    } else {
        Some(Route::Shell)
    }
}

// ============================================================================
// Tests
// ============================================================================
