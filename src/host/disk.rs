//! Disk-backed script host.
//!
//! Installs the library bundle as a file and renders diagrams into
//! standalone HTML fragments that load that bundle in the browser.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::{exposes_library_surface, ScriptHost, LIBRARY_GLOBAL};
use crate::error::{LoaderError, LoaderResult};
use crate::render::{container_style, escape_html, RenderRequest};

/// A bundle written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledBundle {
    pub version: String,
    pub path: PathBuf,
}

/// `ScriptHost` writing bundles under a library directory
pub struct DiskHost {
    lib_dir: PathBuf,
    installed: RwLock<Option<InstalledBundle>>,
}

impl DiskHost {
    pub fn new(lib_dir: impl Into<PathBuf>) -> Self {
        Self {
            lib_dir: lib_dir.into(),
            installed: RwLock::new(None),
        }
    }

    /// Bundle currently serving renders
    pub fn installed(&self) -> Option<InstalledBundle> {
        match self.installed.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn bundle_path(&self, version: &str) -> PathBuf {
        self.lib_dir.join(format!("{}-{}.min.js", LIBRARY_GLOBAL, version))
    }

    fn set_installed(&self, bundle: InstalledBundle) {
        match self.installed.write() {
            Ok(mut guard) => *guard = Some(bundle),
            Err(poisoned) => *poisoned.into_inner() = Some(bundle),
        }
    }

    /// Remove bundles other than `keep` from the library directory
    async fn prune_bundles(&self, keep: &Path) {
        let mut entries = match tokio::fs::read_dir(&self.lib_dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_bundle = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&format!("{}-", LIBRARY_GLOBAL)) && n.ends_with(".min.js"))
                .unwrap_or(false);
            if is_bundle && path != keep {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("Failed to remove old bundle {}: {}", path.display(), e);
                }
            }
        }
    }
}

#[async_trait]
impl ScriptHost for DiskHost {
    async fn install(&self, code: &str, version: &str) -> LoaderResult<()> {
        tokio::fs::create_dir_all(&self.lib_dir).await.map_err(|e| {
            LoaderError::activation(format!(
                "Failed to create {}: {}",
                self.lib_dir.display(),
                e
            ))
        })?;

        let path = self.bundle_path(version);
        tokio::fs::write(&path, code).await.map_err(|e| {
            LoaderError::activation(format!("Failed to write {}: {}", path.display(), e))
        })?;
        debug!("Wrote {} bytes to {}", code.len(), path.display());

        if !exposes_library_surface(code) {
            // Leave the previous bundle active
            let _ = tokio::fs::remove_file(&path).await;
            return Err(LoaderError::activation(format!(
                "{} v{} does not define the {} global",
                LIBRARY_GLOBAL, version, LIBRARY_GLOBAL
            )));
        }

        self.set_installed(InstalledBundle {
            version: version.to_string(),
            path: path.clone(),
        });
        self.prune_bundles(&path).await;
        Ok(())
    }

    fn has_capability(&self, version: &str) -> bool {
        self.installed()
            .map(|bundle| bundle.version == version && bundle.path.exists())
            .unwrap_or(false)
    }

    async fn initialize(&self) -> LoaderResult<()> {
        let bundle = self
            .installed()
            .ok_or_else(|| LoaderError::activation("Mermaid not loaded"))?;
        info!("Mermaid v{} ready at {}", bundle.version, bundle.path.display());
        Ok(())
    }

    async fn render(&self, request: &RenderRequest) -> LoaderResult<String> {
        let bundle = self
            .installed()
            .ok_or_else(|| LoaderError::Render("Mermaid not available".to_string()))?;

        if request.source.trim().is_empty() {
            return Err(LoaderError::Render("No diagram definition found".to_string()));
        }

        let script_src = Url::from_file_path(&bundle.path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| bundle.path.display().to_string());

        let init = serde_json::json!({
            "startOnLoad": true,
            "theme": request.theme.mermaid_theme(),
        });

        Ok(format!(
            "<div class=\"modern-mermaid\" style=\"{style}\">\n\
             <pre class=\"mermaid\" id=\"{id}\">\n{source}\n</pre>\n\
             </div>\n\
             <script src=\"{src}\"></script>\n\
             <script>{global}.initialize({init});</script>\n",
            style = container_style(request.theme, request.width),
            id = escape_html(&request.id),
            source = escape_html(&request.source),
            src = escape_html(&script_src),
            global = LIBRARY_GLOBAL,
            init = init,
        ))
    }
}
