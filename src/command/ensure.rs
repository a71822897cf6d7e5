use anyhow::{Context, Result};

use modern_mermaid::config::LoaderConfig;
use modern_mermaid::MermaidPlugin;

pub async fn run_ensure(config: &LoaderConfig) -> Result<()> {
    let plugin = MermaidPlugin::from_config(config).context("Failed to initialize plugin")?;

    println!("🔄 Preparing Mermaid...");
    plugin
        .ensure_ready()
        .await
        .context("Mermaid could not be loaded")?;

    // Let a pending update finish before the runtime shuts down
    plugin.wait_for_refresh().await;

    match plugin.active_version() {
        Some(active) => println!("✅ Mermaid v{} ready", active.version),
        None => println!("⚠️  Mermaid reported ready but no version is active."),
    }

    Ok(())
}
