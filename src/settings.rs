//! Persisted plugin settings.
//!
//! A small JSON record kept next to the cache. It only tracks which library
//! version is active, for observability; the loader never reads it back to
//! make decisions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{LoaderError, LoaderResult};

/// Sentinel stored before any version has been activated
pub const NOT_LOADED: &str = "not loaded";

/// Settings stored in settings.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Library version currently active, or `NOT_LOADED`
    #[serde(default = "default_active_version")]
    pub active_version: String,

    /// RFC 3339 timestamp of the last successful activation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_loaded_at: Option<String>,
}

fn default_active_version() -> String {
    NOT_LOADED.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_version: default_active_version(),
            last_loaded_at: None,
        }
    }
}

impl Settings {
    pub fn is_loaded(&self) -> bool {
        self.active_version != NOT_LOADED
    }
}

/// Loads and saves the settings record
pub struct SettingsManager {
    settings_path: PathBuf,
    current: Mutex<Settings>,
}

impl SettingsManager {
    /// Open the settings record at `settings_path`, falling back to defaults
    /// if it is missing or unreadable.
    pub fn load(settings_path: impl Into<PathBuf>) -> Self {
        let settings_path = settings_path.into();
        let current = Self::read_settings(&settings_path).unwrap_or_else(|e| {
            warn!("Failed to read settings, starting fresh: {}", e);
            Settings::default()
        });

        Self {
            settings_path,
            current: Mutex::new(current),
        }
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Read settings from disk
    pub fn read_settings(path: &Path) -> LoaderResult<Settings> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            LoaderError::storage(format!("Failed to read settings file {:?}: {}", path, e))
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Snapshot of the in-memory settings
    pub fn current(&self) -> Settings {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Record `version` as active and save. Failures are logged only.
    pub fn record_active(&self, version: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        self.update(|settings| {
            settings.active_version = version.to_string();
            settings.last_loaded_at = Some(now);
        });
    }

    /// Reset the active version to the sentinel and save.
    pub fn reset_active(&self) {
        self.update(|settings| {
            settings.active_version = NOT_LOADED.to_string();
        });
    }

    fn update(&self, apply: impl FnOnce(&mut Settings)) {
        let snapshot = {
            let mut guard = match self.current.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            apply(&mut guard);
            guard.clone()
        };

        if let Err(e) = self.write_settings(&snapshot) {
            warn!("Failed to save settings: {}", e);
        }
    }

    fn write_settings(&self, settings: &Settings) -> LoaderResult<()> {
        if let Some(parent) = self.settings_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.settings_path, content).map_err(|e| {
            LoaderError::storage(format!(
                "Failed to write settings file {:?}: {}",
                self.settings_path, e
            ))
        })?;

        debug!("Settings saved to {:?}", self.settings_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_missing() {
        let tmp = tempdir().unwrap();
        let manager = SettingsManager::load(tmp.path().join("settings.json"));
        let settings = manager.current();
        assert_eq!(settings.active_version, NOT_LOADED);
        assert!(!settings.is_loaded());
        assert!(!manager.settings_path().exists()); // File not created until write
    }

    #[test]
    fn test_record_active_persists() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("settings.json");

        let manager = SettingsManager::load(&path);
        manager.record_active("11.4.1");
        assert_eq!(manager.current().active_version, "11.4.1");

        let reloaded = SettingsManager::load(&path);
        let settings = reloaded.current();
        assert_eq!(settings.active_version, "11.4.1");
        assert!(settings.last_loaded_at.is_some());

        reloaded.reset_active();
        assert_eq!(
            SettingsManager::read_settings(&path).unwrap().active_version,
            NOT_LOADED
        );
    }

    #[test]
    fn test_corrupt_settings_fall_back() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let manager = SettingsManager::load(&path);
        assert_eq!(manager.current(), Settings::default());
    }

    #[test]
    fn test_camel_case_format() {
        let settings: Settings = serde_json::from_str(r#"{"activeVersion":"10.0.0"}"#).unwrap();
        assert_eq!(settings.active_version, "10.0.0");
        assert!(settings.last_loaded_at.is_none());
    }
}
