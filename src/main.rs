use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

mod command;

use modern_mermaid::config::{self, LoaderConfig};

/// Modern Mermaid - fetch, cache and render Mermaid diagrams
#[derive(Parser)]
#[command(name = "modern-mermaid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory for the library cache and settings. Defaults to ~/.modern-mermaid
    #[arg(long, env = config::DATA_DIR_ENV)]
    data_dir: Option<String>,

    /// npm registry base URL
    #[arg(long, env = config::REGISTRY_URL_ENV, hide = true)]
    registry_url: Option<String>,

    /// CDN base URL serving package files
    #[arg(long, env = config::CDN_URL_ENV, hide = true)]
    cdn_url: Option<String>,

    /// Seconds to wait for the asset download
    #[arg(long)]
    asset_timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download (or load from cache) the Mermaid library
    Ensure,
    /// Render a diagram file to an HTML fragment
    Render {
        /// File containing the code block body
        input: PathBuf,

        /// Code block tag selecting the theme (mer, merlight, merdark)
        #[arg(long, default_value = "mer")]
        tag: String,

        /// Write the artifact here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show cached and active library versions
    Status,
    /// Remove the cached library
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&cli)?;

    match cli.command {
        Some(Commands::Ensure) => command::run_ensure(&config).await?,
        Some(Commands::Render { input, tag, output }) => {
            command::run_render(&config, &input, &tag, output.as_deref()).await?
        }
        Some(Commands::Status) => command::run_status(&config).await?,
        Some(Commands::ClearCache) => command::run_clear_cache(&config).await?,
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            eprintln!("Use 'modern-mermaid ensure' to download the Mermaid library.");
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<LoaderConfig> {
    let mut config = LoaderConfig::from_env(cli.data_dir.clone())?;

    if let Some(url) = &cli.registry_url {
        config.registry_url = config::parse_base_url(url)?;
    }
    if let Some(url) = &cli.cdn_url {
        config.cdn_url = config::parse_base_url(url)?;
    }
    if let Some(secs) = cli.asset_timeout {
        config.asset_timeout = std::time::Duration::from_secs(secs);
    }

    Ok(config)
}
