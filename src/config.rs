//! Loader configuration.
//!
//! Defaults point at the public npm registry and the jsDelivr CDN. Each
//! endpoint and the data directory can be overridden through environment
//! variables, and the CLI layers its own flags on top.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

/// Default npm package providing the rendering library
pub const DEFAULT_PACKAGE: &str = "mermaid";

/// Default registry base URL
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Default CDN base URL
pub const DEFAULT_CDN_URL: &str = "https://cdn.jsdelivr.net/npm";

/// Path of the minified bundle inside the package
pub const DEFAULT_ASSET_PATH: &str = "dist/mermaid.min.js";

/// Timeout for the latest-version query in seconds
pub const REGISTRY_TIMEOUT_SECS: u64 = 5;

/// Timeout for the asset download in seconds (the bundle is several hundred KB)
pub const ASSET_TIMEOUT_SECS: u64 = 60;

/// Timeout for installing the asset into the script host in seconds
pub const INSTALL_TIMEOUT_SECS: u64 = 60;

/// Retries on transient network failures
pub const DEFAULT_MAX_RETRIES: usize = 1;

pub const REGISTRY_URL_ENV: &str = "MODERN_MERMAID_REGISTRY_URL";
pub const CDN_URL_ENV: &str = "MODERN_MERMAID_CDN_URL";
pub const DATA_DIR_ENV: &str = "MODERN_MERMAID_DATA_DIR";
pub const USER_AGENT_ENV: &str = "MODERN_MERMAID_USER_AGENT";

const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime configuration for the loader
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub package: String,
    pub registry_url: Url,
    pub cdn_url: Url,
    pub asset_path: String,
    pub registry_timeout: Duration,
    pub asset_timeout: Duration,
    pub install_timeout: Duration,
    pub max_retries: usize,
    /// Root for the cache store, installed bundles and settings.json
    pub data_dir: PathBuf,
    pub user_agent: String,
    /// Clear the cached asset when the plugin unloads
    pub clear_cache_on_unload: bool,
}

impl LoaderConfig {
    /// Build a configuration rooted at `data_dir` with default endpoints.
    pub fn with_data_dir(data_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            package: DEFAULT_PACKAGE.to_string(),
            registry_url: parse_base_url(DEFAULT_REGISTRY_URL)?,
            cdn_url: parse_base_url(DEFAULT_CDN_URL)?,
            asset_path: DEFAULT_ASSET_PATH.to_string(),
            registry_timeout: Duration::from_secs(REGISTRY_TIMEOUT_SECS),
            asset_timeout: Duration::from_secs(ASSET_TIMEOUT_SECS),
            install_timeout: Duration::from_secs(INSTALL_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            data_dir,
            user_agent: format!("modern-mermaid/{}", DEFAULT_VERSION),
            clear_cache_on_unload: true,
        })
    }

    /// Build a configuration from defaults and environment overrides.
    ///
    /// `data_dir` takes precedence over `MODERN_MERMAID_DATA_DIR`, which takes
    /// precedence over `~/.modern-mermaid`.
    pub fn from_env(data_dir: Option<String>) -> Result<Self> {
        let data_dir = match data_dir.or_else(|| std::env::var(DATA_DIR_ENV).ok()) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let mut config = Self::with_data_dir(data_dir)?;

        if let Ok(url) = std::env::var(REGISTRY_URL_ENV) {
            config.registry_url = parse_base_url(&url)
                .with_context(|| format!("Invalid {}", REGISTRY_URL_ENV))?;
        }
        if let Ok(url) = std::env::var(CDN_URL_ENV) {
            config.cdn_url =
                parse_base_url(&url).with_context(|| format!("Invalid {}", CDN_URL_ENV))?;
        }
        if let Ok(agent) = std::env::var(USER_AGENT_ENV) {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }

        Ok(config)
    }

    /// Directory holding the key-value cache files
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Directory holding installed library bundles
    pub fn lib_dir(&self) -> PathBuf {
        self.data_dir.join("lib")
    }

    /// Path of the persisted settings record
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

/// `~/.modern-mermaid`
pub fn default_data_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Could not determine home directory")?
        .join(".modern-mermaid"))
}

/// Parse a base URL, forcing a trailing slash so `Url::join` appends
/// rather than replacing the last path segment.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&normalized).with_context(|| format!("Invalid base URL: {}", raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("Unsupported URL scheme '{}' in {}", url.scheme(), raw);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let tmp = tempdir().unwrap();
        let config = LoaderConfig::with_data_dir(tmp.path().to_path_buf()).unwrap();
        assert_eq!(config.package, "mermaid");
        assert_eq!(config.registry_url.as_str(), "https://registry.npmjs.org/");
        assert_eq!(config.registry_timeout, Duration::from_secs(5));
        assert_eq!(config.asset_timeout, Duration::from_secs(60));
        assert!(config.user_agent.starts_with("modern-mermaid/"));
        assert_eq!(config.settings_path(), tmp.path().join("settings.json"));
        assert_eq!(config.store_dir(), tmp.path().join("store"));
    }

    #[test]
    fn test_parse_base_url() {
        let url = parse_base_url("https://cdn.jsdelivr.net/npm").unwrap();
        assert_eq!(url.as_str(), "https://cdn.jsdelivr.net/npm/");
        assert_eq!(
            url.join("mermaid@11.4.0/dist/mermaid.min.js").unwrap().as_str(),
            "https://cdn.jsdelivr.net/npm/mermaid@11.4.0/dist/mermaid.min.js"
        );

        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        let config = LoaderConfig::from_env(Some(dir)).unwrap();
        assert_eq!(config.data_dir, tmp.path());
    }
}
