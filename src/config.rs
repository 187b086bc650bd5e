//! Worker configuration management.
//!
//! This module defines the immutable configuration injected into the
//! lifecycle controller and request router: the versioned app cache name,
//! the persistent tile cache name, the tile-provider routing pattern, and
//! the precache manifest.
//!
//! A deployment invalidates stale app-shell content solely by bumping
//! `app_cache`; the tile cache name never changes.
//!
//! Configuration can be stored at `~/.config/trailworker/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "trailworker";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Versioned app cache name. Bumped on every deployment.
const APP_CACHE_NAME: &str = "calcagnini-trails-v2";

/// Persistent tile cache name. Stable across deployments.
const TILE_CACHE_NAME: &str = "calcagnini-tiles-v1";

/// URL substring identifying map-tile requests.
const TILE_PATTERN: &str = "/tiles/";

/// Document served as the offline fallback for navigation requests.
const INDEX_URL: &str = "/index.html";

/// Core app files cached at install time.
const PRECACHE_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css",
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Name of the versioned app-shell cache. Exactly one store with this
    /// name is authoritative at any time; stores with stale names are
    /// garbage-collected on activation.
    pub app_cache: String,
    /// Name of the tile cache. Never deleted by the lifecycle controller.
    pub tile_cache: String,
    /// Requests whose URL contains this substring are routed to the tile
    /// cache policy.
    pub tile_pattern: String,
    /// URLs fetched and stored into the app cache during install.
    pub precache: Vec<String>,
    /// Cached document returned when a navigation request fails offline.
    pub index_url: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_cache: APP_CACHE_NAME.to_string(),
            tile_cache: TILE_CACHE_NAME.to_string(),
            tile_pattern: TILE_PATTERN.to_string(),
            precache: PRECACHE_MANIFEST.iter().map(|s| s.to_string()).collect(),
            index_url: INDEX_URL.to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Default root for the on-disk cache backend.
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_names_differ() {
        let config = WorkerConfig::default();
        assert_ne!(config.app_cache, config.tile_cache);
    }

    #[test]
    fn test_default_manifest_includes_index() {
        let config = WorkerConfig::default();
        assert!(config.precache.iter().any(|u| u == &config.index_url));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = WorkerConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: WorkerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
