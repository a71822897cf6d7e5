use anyhow::Result;

use modern_mermaid::config::LoaderConfig;
use modern_mermaid::MermaidPlugin;

pub async fn run_status(config: &LoaderConfig) -> Result<()> {
    let plugin = MermaidPlugin::from_config(config)?;
    let settings = plugin.settings();

    match plugin.cached() {
        Some(entry) => {
            println!("📦 Cached Mermaid v{}", entry.version);
            println!("   Size: {} bytes", entry.code.len());
        }
        None => {
            println!("❌ No cached Mermaid");
            println!("   Run 'modern-mermaid ensure' to download it.");
        }
    }

    if settings.is_loaded() {
        println!("   Active version: {}", settings.active_version);
        if let Some(loaded_at) = &settings.last_loaded_at {
            println!("   Last loaded: {}", loaded_at);
        }
    } else {
        println!("   Active version: none");
    }
    println!("   Data directory: {}", config.data_dir.display());

    Ok(())
}
