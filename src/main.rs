//! Portal Cache maintenance tool
//!
//! Inspects and cleans the file-backed cache medium.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_cache::{spawn_sweep_task, CacheStore, Config, FileMedium};

#[derive(Parser, Debug)]
#[command(name = "portal_cache", version, about = "Inspect and clean the portal cache")]
struct Cli {
    /// Cache directory (overrides CACHE_DIR)
    #[arg(long)]
    dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print entry count, size, counters and keys as JSON
    Stats,
    /// Remove expired and corrupt entries
    Sweep,
    /// Remove one entry
    Invalidate { key: String },
    /// Remove every entry whose key starts with PREFIX
    InvalidatePrefix { prefix: String },
    /// Remove every entry in the namespace
    Clear,
    /// Sweep on the configured schedule until Ctrl+C
    Watch,
}

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the file-backed medium and build the store
/// 4. Run the requested command
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.dir {
        config.cache_dir = Some(dir);
    }
    let dir = config.resolve_cache_dir()?;
    info!(
        "Configuration loaded: dir={}, namespace={}, default_ttl={}ms, schema_version={}",
        dir.display(),
        config.namespace,
        config.default_ttl_ms,
        config.schema_version
    );

    let medium = FileMedium::open(&dir)
        .with_context(|| format!("Failed to open cache directory {}", dir.display()))?;
    let store = Arc::new(CacheStore::from_config(Arc::new(medium), &config));

    match cli.command {
        Command::Stats => {
            let stats = store.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Sweep => {
            let removed = store.clear_expired();
            info!("Removed {} expired entries", removed);
        }
        Command::Invalidate { key } => {
            store.invalidate(&key);
            info!("Invalidated {}", key);
        }
        Command::InvalidatePrefix { prefix } => {
            let removed = store.invalidate_by_prefix(&prefix);
            info!("Removed {} entries under prefix {}", removed, prefix);
        }
        Command::Clear => {
            let removed = store.clear_all();
            info!("Removed {} entries", removed);
        }
        Command::Watch => {
            let handle = spawn_sweep_task(
                store,
                Duration::from_millis(config.sweep_delay_ms),
                Duration::from_secs(config.sweep_interval_secs),
            );
            tokio::signal::ctrl_c()
                .await
                .context("Failed to install Ctrl+C handler")?;
            info!("Received Ctrl+C, stopping sweep");
            handle.abort();
        }
    }

    Ok(())
}
