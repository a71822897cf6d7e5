use anyhow::Result;

use modern_mermaid::config::LoaderConfig;
use modern_mermaid::MermaidPlugin;

pub async fn run_clear_cache(config: &LoaderConfig) -> Result<()> {
    let plugin = MermaidPlugin::from_config(config)?;
    let cached = plugin.cached();

    plugin.clear_cache();

    match cached {
        Some(entry) => println!("✅ Removed cached Mermaid v{}", entry.version),
        None => println!("Cache is already empty."),
    }

    Ok(())
}
