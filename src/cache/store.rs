//! String key-value stores backing the asset cache.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{LoaderError, LoaderResult};

/// Minimal string key-value store (localStorage-like)
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> LoaderResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> LoaderResult<()>;
    fn remove(&self, key: &str) -> LoaderResult<()>;
}

/// One file per key under a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// first write so a read-only location still reads as empty.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> LoaderResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(LoaderError::storage(format!("invalid store key: {:?}", key)));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> LoaderResult<Option<String>> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path).map_err(|e| {
            LoaderError::storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> LoaderResult<()> {
        let path = self.key_path(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            LoaderError::storage(format!(
                "Failed to create directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        // Write-then-rename keeps a reader from seeing a half-written value
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).map_err(|e| {
            LoaderError::storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            LoaderError::storage(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        debug!("Stored {} ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> LoaderResult<()> {
        let path = self.key_path(key)?;
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                LoaderError::storage(format!("Failed to remove {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}

/// In-process store, mostly for embedding and tests
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> LoaderResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| LoaderError::storage("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> LoaderResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LoaderResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> LoaderResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
