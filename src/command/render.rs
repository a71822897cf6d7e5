use anyhow::{Context, Result};
use std::path::Path;

use modern_mermaid::config::LoaderConfig;
use modern_mermaid::render::{RenderArtifact, FENCE_TAGS};
use modern_mermaid::MermaidPlugin;

pub async fn run_render(
    config: &LoaderConfig,
    input: &Path,
    tag: &str,
    output: Option<&Path>,
) -> Result<()> {
    if !FENCE_TAGS.contains(&tag) {
        anyhow::bail!(
            "Unknown code block tag '{}'. Expected one of: {}",
            tag,
            FENCE_TAGS.join(", ")
        );
    }

    let source = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read diagram file: {}", input.display()))?;

    let plugin = MermaidPlugin::from_config(config).context("Failed to initialize plugin")?;
    let artifact = plugin
        .render_block(tag, &source)
        .await
        .context("Mermaid could not be loaded")?;
    plugin.wait_for_refresh().await;

    if let RenderArtifact::Error { message } = &artifact {
        eprintln!("⚠️  {}", message);
    }

    let markup = artifact.markup();
    match output {
        Some(path) => {
            std::fs::write(path, &markup)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Wrote {}", path.display());
        }
        None => print!("{}", markup),
    }

    Ok(())
}
