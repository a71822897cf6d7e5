//! Versioned asset cache.
//!
//! The cache holds exactly one `{version, code}` pair under two namespaced
//! keys. Every operation fails soft: storage problems are logged and read
//! as a cache miss, never propagated to the loader.

mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore};

use std::sync::Arc;

use tracing::{debug, error, warn};

/// Key holding the cached library version
pub const CACHED_VERSION_KEY: &str = "modern-mermaid-cached-version";

/// Key holding the cached library code
pub const CACHED_CODE_KEY: &str = "modern-mermaid-cached-code";

/// Last library asset that was successfully loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub version: String,
    pub code: String,
}

/// Cache of the last activated library asset
#[derive(Clone)]
pub struct AssetCache {
    store: Arc<dyn KeyValueStore>,
}

impl AssetCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the cached entry.
    ///
    /// Returns `None` when either key is missing or empty, or when the store
    /// cannot be read.
    pub fn read(&self) -> Option<CacheEntry> {
        let version = match self.store.get(CACHED_VERSION_KEY) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to load cache: {}", e);
                return None;
            }
        };
        let code = match self.store.get(CACHED_CODE_KEY) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load cache: {}", e);
                return None;
            }
        };

        match (version, code) {
            (Some(version), Some(code)) if !version.trim().is_empty() && !code.is_empty() => {
                debug!("Cache hit: version {} ({} bytes)", version, code.len());
                Some(CacheEntry {
                    version: version.trim().to_string(),
                    code,
                })
            }
            (None, None) => None,
            _ => {
                warn!("Ignoring partial cache entry");
                None
            }
        }
    }

    /// Persist an entry, overwriting any previous one.
    ///
    /// The version key is dropped first and written last, so an interrupted
    /// write reads back as a miss (or as the previous entry when the old
    /// version cannot be dropped), never as a new version over old code.
    pub fn write(&self, version: &str, code: &str) {
        if let Err(e) = self.store.remove(CACHED_VERSION_KEY) {
            error!("Failed to save cache: {}", e);
            return;
        }
        if let Err(e) = self.store.set(CACHED_CODE_KEY, code) {
            error!("Failed to save cache: {}", e);
            return;
        }
        if let Err(e) = self.store.set(CACHED_VERSION_KEY, version) {
            error!("Failed to save cache: {}", e);
            return;
        }
        debug!("Cached version {}", version);
    }

    /// Remove the cached entry.
    pub fn clear(&self) {
        for key in [CACHED_VERSION_KEY, CACHED_CODE_KEY] {
            if let Err(e) = self.store.remove(key) {
                error!("Failed to clear cache: {}", e);
            }
        }
        debug!("Cache cleared");
    }
}
