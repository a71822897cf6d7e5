//! Load coordinator.
//!
//! Every render path calls `ensure_ready()`. The first call from `Unloaded`
//! starts one load episode in its own task; calls arriving while it runs
//! join the same shared handle, so all of them observe one outcome and only
//! one network sequence is ever in flight.
//!
//! Episode policy (cache first):
//! 1. Cached entry: activate it, then check the registry in the background
//!    and swap in a newer version if one exists.
//! 2. No cache: resolve the latest version, fetch it, activate it, cache it.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::notice::{Notice, Notifier};
use crate::cache::{AssetCache, CacheEntry};
use crate::error::{LoaderError, LoaderResult};
use crate::host::ScriptHost;
use crate::registry::AssetSource;
use crate::settings::SettingsManager;

/// Readiness of the library in this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// Where the active asset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOrigin {
    Cache,
    Network,
}

/// Library version currently active in the script host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAsset {
    pub version: String,
    pub origin: AssetOrigin,
}

type EpisodeHandle = Shared<BoxFuture<'static, LoaderResult<()>>>;

enum Slot {
    Unloaded,
    Loading(EpisodeHandle),
    Loaded,
}

impl Slot {
    fn state(&self) -> LoadState {
        match self {
            Slot::Unloaded => LoadState::Unloaded,
            Slot::Loading(_) => LoadState::Loading,
            Slot::Loaded => LoadState::Loaded,
        }
    }
}

struct Inner {
    source: Arc<dyn AssetSource>,
    host: Arc<dyn ScriptHost>,
    cache: AssetCache,
    settings: Arc<SettingsManager>,
    notifier: Arc<dyn Notifier>,
    install_timeout: Duration,
    slot: Mutex<Slot>,
    active: RwLock<Option<ActiveAsset>>,
    refresh: Mutex<Option<JoinHandle<()>>>,
}

/// Serializes library loading and owns the load state machine
#[derive(Clone)]
pub struct LoadCoordinator {
    inner: Arc<Inner>,
}

impl LoadCoordinator {
    pub fn new(
        source: Arc<dyn AssetSource>,
        host: Arc<dyn ScriptHost>,
        cache: AssetCache,
        settings: Arc<SettingsManager>,
        notifier: Arc<dyn Notifier>,
        install_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                host,
                cache,
                settings,
                notifier,
                install_timeout,
                slot: Mutex::new(Slot::Unloaded),
                active: RwLock::new(None),
                refresh: Mutex::new(None),
            }),
        }
    }

    /// Make sure the library is active.
    ///
    /// Returns immediately once loaded. While an episode runs, callers wait
    /// for it and receive its outcome. A failed episode leaves the state
    /// `Unloaded` so a later call can retry.
    pub async fn ensure_ready(&self) -> LoaderResult<()> {
        let handle = {
            let mut slot = self.inner.lock_slot();
            match &*slot {
                Slot::Loaded => return Ok(()),
                Slot::Loading(handle) => {
                    debug!("Joining in-flight Mermaid load");
                    handle.clone()
                }
                Slot::Unloaded => {
                    let handle = self.start_episode();
                    *slot = Slot::Loading(handle.clone());
                    handle
                }
            }
        };

        handle.await
    }

    fn start_episode(&self) -> EpisodeHandle {
        let episode_inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { episode_inner.run_episode().await });

        let inner = Arc::clone(&self.inner);
        async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(LoaderError::activation(format!(
                    "load task aborted: {}",
                    e
                ))),
            };
            inner.settle(&outcome);
            outcome
        }
        .boxed()
        .shared()
    }

    /// Current load state
    pub fn state(&self) -> LoadState {
        self.inner.lock_slot().state()
    }

    /// Library version currently active, if any
    pub fn active_version(&self) -> Option<ActiveAsset> {
        self.inner.active()
    }

    /// Wait for the background update check started by a cache-hit load.
    pub async fn wait_for_refresh(&self) {
        let handle = match self.inner.refresh.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Background update task failed: {}", e);
            }
        }
    }

    /// Read the cached asset; storage failures read as absent.
    pub fn read_cache(&self) -> Option<CacheEntry> {
        self.inner.cache.read()
    }

    /// Persist an asset; storage failures are logged only.
    pub fn write_cache(&self, version: &str, code: &str) {
        self.inner.cache.write(version, code)
    }

    /// Remove the cached asset; storage failures are logged only.
    pub fn clear_cache(&self) {
        self.inner.cache.clear()
    }

    /// Install `code` as `version` and run its initialization hook.
    ///
    /// On success an `Unloaded` coordinator becomes `Loaded`, so a later
    /// `ensure_ready` does not start a network episode. A running episode is
    /// left to settle the state itself.
    pub async fn activate_asset(&self, code: &str, version: &str) -> LoaderResult<()> {
        self.inner
            .activate_asset(code, version, AssetOrigin::Network)
            .await?;

        let mut slot = self.inner.lock_slot();
        if matches!(*slot, Slot::Unloaded) {
            *slot = Slot::Loaded;
        }
        Ok(())
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn active(&self) -> Option<ActiveAsset> {
        match self.active.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn settle(&self, outcome: &LoaderResult<()>) {
        let mut slot = self.lock_slot();
        *slot = match outcome {
            Ok(()) => Slot::Loaded,
            Err(_) => Slot::Unloaded,
        };
    }

    async fn run_episode(self: Arc<Self>) -> LoaderResult<()> {
        if let Some(entry) = self.cache.read() {
            info!("📦 Using cached Mermaid v{}", entry.version);
            if let Err(e) = self
                .activate_asset(&entry.code, &entry.version, AssetOrigin::Cache)
                .await
            {
                error!("Cached Mermaid v{} failed to activate: {}", entry.version, e);
                // A cache that cannot activate would fail every retry
                self.cache.clear();
                self.notifier.notify(Notice::InitFailed {
                    reason: e.to_string(),
                });
                return Err(e);
            }

            self.spawn_refresh(entry.version);
            return Ok(());
        }

        self.load_from_network().await.map_err(|e| {
            error!("Failed to load Mermaid: {}", e);
            self.notifier.notify(Notice::InitFailed {
                reason: e.to_string(),
            });
            e
        })
    }

    async fn load_from_network(&self) -> LoaderResult<()> {
        info!("🌐 No cached Mermaid, resolving latest version...");
        let version = self.source.resolve_latest_version().await?;
        let code = self.source.fetch_asset(&version).await?;
        self.activate_asset(&code, &version, AssetOrigin::Network)
            .await?;
        self.cache.write(&version, &code);
        self.notifier.notify(Notice::Loaded { version });
        Ok(())
    }

    fn spawn_refresh(self: &Arc<Self>, cached_version: String) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.refresh(cached_version).await });

        let mut guard = match self.refresh.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(handle);
    }

    /// Background step after a cache hit. Never surfaces errors.
    async fn refresh(&self, cached_version: String) {
        let latest = match self.source.resolve_latest_version().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!("Mermaid update check failed, using cache: {}", e);
                self.notifier.notify(Notice::UpdateFailed {
                    retained: cached_version,
                });
                return;
            }
        };

        if latest == cached_version {
            debug!("Cached Mermaid v{} is the latest", cached_version);
            return;
        }

        info!("⬆️  Updating Mermaid v{} -> v{}", cached_version, latest);
        let upgraded = async {
            let code = self.source.fetch_asset(&latest).await?;
            self.activate_asset(&code, &latest, AssetOrigin::Network)
                .await?;
            Ok::<_, LoaderError>(code)
        }
        .await;

        match upgraded {
            Ok(code) => {
                self.cache.write(&latest, &code);
                self.notifier.notify(Notice::Loaded { version: latest });
            }
            Err(e) => {
                warn!("Failed to load latest version, using cache: {}", e);
                self.notifier.notify(Notice::UpdateFailed {
                    retained: cached_version,
                });
            }
        }
    }

    async fn activate_asset(
        &self,
        code: &str,
        version: &str,
        origin: AssetOrigin,
    ) -> LoaderResult<()> {
        match tokio::time::timeout(self.install_timeout, self.host.install(code, version)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(into_activation(e)),
            Err(_) => {
                warn!(
                    "Installing Mermaid v{} did not complete within {:?}; checking anyway",
                    version, self.install_timeout
                );
            }
        }

        if !self.host.has_capability(version) {
            return Err(LoaderError::activation(format!(
                "Mermaid v{} did not expose mermaid.initialize/render",
                version
            )));
        }

        self.host.initialize().await.map_err(into_activation)?;

        {
            let mut active = match self.active.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *active = Some(ActiveAsset {
                version: version.to_string(),
                origin,
            });
        }
        self.settings.record_active(version);
        debug!("Activated Mermaid v{} ({:?})", version, origin);
        Ok(())
    }
}

fn into_activation(err: LoaderError) -> LoaderError {
    match err {
        LoaderError::Activation(_) => err,
        other => LoaderError::activation(other.to_string()),
    }
}
