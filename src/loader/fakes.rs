//! In-process doubles for loader tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::notice::{Notice, Notifier};
use crate::error::{LoaderError, LoaderResult};
use crate::host::ScriptHost;
use crate::registry::AssetSource;
use crate::render::RenderRequest;

/// Registry double with call counters
pub(crate) struct FakeSource {
    latest: Mutex<Option<String>>,
    assets: Mutex<HashMap<String, String>>,
    delay: Duration,
    resolve_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new(latest: &str) -> Self {
        Self {
            latest: Mutex::new(Some(latest.to_string())),
            assets: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            resolve_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Registry that is unreachable
    pub(crate) fn failing_registry() -> Self {
        let source = Self::new("");
        source.latest.lock().unwrap().take();
        source
    }

    pub(crate) fn with_asset(self, version: &str, code: &str) -> Self {
        self.add_asset(version, code);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn add_asset(&self, version: &str, code: &str) {
        self.assets
            .lock()
            .unwrap()
            .insert(version.to_string(), code.to_string());
    }

    pub(crate) fn set_latest(&self, version: &str) {
        *self.latest.lock().unwrap() = Some(version.to_string());
    }

    pub(crate) fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetSource for FakeSource {
    async fn resolve_latest_version(&self) -> LoaderResult<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.latest
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| LoaderError::network("registry unreachable"))
    }

    async fn fetch_asset(&self, version: &str) -> LoaderResult<String> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.assets
            .lock()
            .unwrap()
            .get(version)
            .cloned()
            .ok_or_else(|| LoaderError::network("HTTP error! status: 404"))
    }
}

/// Script host double
pub(crate) struct FakeHost {
    expose_surface: bool,
    hang_install: bool,
    installs: Mutex<Vec<String>>,
    code: Mutex<HashMap<String, String>>,
    capable: Mutex<HashSet<String>>,
    active: Mutex<Option<String>>,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self {
            expose_surface: true,
            hang_install: false,
            installs: Mutex::new(Vec::new()),
            code: Mutex::new(HashMap::new()),
            capable: Mutex::new(HashSet::new()),
            active: Mutex::new(None),
        }
    }

    /// Installed code never defines the library global
    pub(crate) fn without_surface(mut self) -> Self {
        self.expose_surface = false;
        self
    }

    /// Install never signals completion
    pub(crate) fn hanging_install(mut self) -> Self {
        self.hang_install = true;
        self
    }

    pub(crate) fn installs(&self) -> Vec<String> {
        self.installs.lock().unwrap().clone()
    }

    pub(crate) fn installed_code(&self, version: &str) -> Option<String> {
        self.code.lock().unwrap().get(version).cloned()
    }
}

#[async_trait]
impl ScriptHost for FakeHost {
    async fn install(&self, code: &str, version: &str) -> LoaderResult<()> {
        self.installs.lock().unwrap().push(version.to_string());
        self.code
            .lock()
            .unwrap()
            .insert(version.to_string(), code.to_string());
        if self.expose_surface {
            self.capable.lock().unwrap().insert(version.to_string());
            *self.active.lock().unwrap() = Some(version.to_string());
        }
        if self.hang_install {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn has_capability(&self, version: &str) -> bool {
        self.capable.lock().unwrap().contains(version)
    }

    async fn initialize(&self) -> LoaderResult<()> {
        Ok(())
    }

    async fn render(&self, request: &RenderRequest) -> LoaderResult<String> {
        let active = self.active.lock().unwrap().clone();
        if active.is_none() {
            return Err(LoaderError::Render("Mermaid not available".to_string()));
        }
        if request.source.contains("invalid") {
            return Err(LoaderError::Render("Parse error on line 1".to_string()));
        }
        Ok(format!(
            "<svg id=\"{}\" data-theme=\"{}\">{}</svg>",
            request.id,
            request.theme.mermaid_theme(),
            request.source
        ))
    }
}

/// Notifier that records every notice
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
