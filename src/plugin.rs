//! Plugin facade used by the host glue.
//!
//! Wires configuration, registry, cache, settings and script host into a
//! `LoadCoordinator` and exposes the operations code-block processors need.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{AssetCache, CacheEntry, FileStore, KeyValueStore};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::host::{DiskHost, ScriptHost};
use crate::loader::{ActiveAsset, LoadCoordinator, LoadState, LogNotifier, Notifier};
use crate::registry::{AssetSource, NpmRegistry};
use crate::render::{DiagramTheme, RenderArtifact, RenderRequest};
use crate::settings::{Settings, SettingsManager};

/// Mermaid rendering plugin core
pub struct MermaidPlugin {
    coordinator: LoadCoordinator,
    host: Arc<dyn ScriptHost>,
    settings: Arc<SettingsManager>,
    clear_cache_on_unload: bool,
}

impl MermaidPlugin {
    /// Build the plugin with the npm registry, on-disk cache and disk host.
    pub fn from_config(config: &LoaderConfig) -> LoaderResult<Self> {
        let source: Arc<dyn AssetSource> = Arc::new(NpmRegistry::new(config)?);
        let host: Arc<dyn ScriptHost> = Arc::new(DiskHost::new(config.lib_dir()));
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.store_dir()));
        Ok(Self::with_parts(
            config,
            source,
            host,
            store,
            Arc::new(LogNotifier),
        ))
    }

    /// Build the plugin from explicit collaborators.
    pub fn with_parts(
        config: &LoaderConfig,
        source: Arc<dyn AssetSource>,
        host: Arc<dyn ScriptHost>,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let settings = Arc::new(SettingsManager::load(config.settings_path()));
        debug!(
            "Loaded settings: active version {}",
            settings.current().active_version
        );

        let coordinator = LoadCoordinator::new(
            source,
            host.clone(),
            AssetCache::new(store),
            settings.clone(),
            notifier,
            config.install_timeout,
        );

        Self {
            coordinator,
            host,
            settings,
            clear_cache_on_unload: config.clear_cache_on_unload,
        }
    }

    /// Make sure the library is loaded
    pub async fn ensure_ready(&self) -> LoaderResult<()> {
        self.coordinator.ensure_ready().await
    }

    /// Render one code block body.
    ///
    /// Fails only when the library cannot be made ready. Failures of the
    /// diagram itself come back as `RenderArtifact::Error` so the rest of the
    /// document keeps rendering.
    pub async fn render(&self, source: &str, theme: DiagramTheme) -> LoaderResult<RenderArtifact> {
        self.ensure_ready().await?;

        let request = RenderRequest::from_block(source, theme);
        match self.host.render(&request).await {
            Ok(markup) => Ok(RenderArtifact::Diagram {
                id: request.id,
                markup,
                width: request.width,
                background: theme.background(),
            }),
            Err(e) => {
                warn!("Failed to render {}: {}", request.id, e);
                Ok(RenderArtifact::error(render_reason(&e)))
            }
        }
    }

    /// Render a block registered under `tag` (`mer`, `merlight`, `merdark`).
    pub async fn render_block(&self, tag: &str, source: &str) -> LoaderResult<RenderArtifact> {
        match DiagramTheme::from_tag(tag) {
            Some(theme) => self.render(source, theme).await,
            None => Ok(RenderArtifact::error(format!("unknown code block tag '{}'", tag))),
        }
    }

    /// Drop the cached library and reset the recorded active version.
    pub fn clear_cache(&self) {
        self.coordinator.clear_cache();
        self.settings.reset_active();
        info!("Mermaid cache cleared");
    }

    /// Called when the host unloads the plugin
    pub fn unload(&self) {
        if self.clear_cache_on_unload {
            self.clear_cache();
        }
    }

    pub fn cached(&self) -> Option<CacheEntry> {
        self.coordinator.read_cache()
    }

    pub fn state(&self) -> LoadState {
        self.coordinator.state()
    }

    pub fn active_version(&self) -> Option<ActiveAsset> {
        self.coordinator.active_version()
    }

    pub fn settings(&self) -> Settings {
        self.settings.current()
    }

    /// Wait for a pending background update check
    pub async fn wait_for_refresh(&self) {
        self.coordinator.wait_for_refresh().await
    }
}

fn render_reason(err: &LoaderError) -> String {
    match err {
        LoaderError::Render(reason) => reason.clone(),
        other => other.to_string(),
    }
}
