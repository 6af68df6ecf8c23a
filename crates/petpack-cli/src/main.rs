//! Petpack CLI - inspect and arrange resource packs from the command line.
//!
//! Diagnostics go to stderr; command output goes to stdout so it can be
//! piped (`petpack cat dialog/greeting.txt > out.txt`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use petpack_core::{AssetStore, PackRegistry, PackWatcher, RegistryConfig, WatcherConfig};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "petpack")]
#[command(about = "Inspect and arrange desktop pet resource packs")]
struct Args {
    /// Directory holding the built-in packs
    #[arg(long)]
    builtin_root: PathBuf,

    /// Directory holding user packs (defaults to the platform data directory)
    #[arg(long)]
    user_root: Option<PathBuf>,

    /// File storing the active pack ordering
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List loaded packs as JSON, active ones first
    Packs,
    /// List resolvable resource paths
    List {
        /// Only paths starting with this prefix
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Show which pack provides a path and where it is stored
    Resolve { path: String },
    /// Write a resource's bytes to stdout
    Cat { path: String },
    /// Activate a pack at the highest priority
    Activate { id: String },
    /// Deactivate a pack
    Deactivate { id: String },
    /// Move a pack to a position in the active list (0 = highest)
    Priority { id: String, index: usize },
    /// Reload whenever the user pack directory changes
    Watch,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG wins over --debug
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let user_root = match args.user_root {
        Some(path) => path,
        None => RegistryConfig::default_user_root()?,
    };
    let mut config = RegistryConfig::new(&args.builtin_root, &user_root);
    if let Some(state_file) = args.state_file {
        config = config.with_state_file(state_file);
    }

    let (registry, report) = PackRegistry::open(config).context("Failed to load resource packs")?;
    info!(
        "Loaded {} packs ({} skipped) from {}",
        report.loaded.len(),
        report.skipped.len(),
        user_root.display()
    );
    let registry = Arc::new(registry);

    match args.command {
        Command::Packs => {
            println!("{}", serde_json::to_string_pretty(&registry.packs())?);
        }
        Command::List { prefix } => {
            for path in registry.list_resources(&prefix) {
                println!("{}", path);
            }
        }
        Command::Resolve { path } => {
            let locator = registry
                .resolve(&path)
                .with_context(|| format!("No active pack provides {}", path))?;
            let provider = registry.provider(&path).unwrap_or_default();
            println!("{}\t{}", provider, locator);
        }
        Command::Cat { path } => {
            let store = AssetStore::new(Arc::clone(&registry));
            let bytes = store
                .load_bytes(&path)?
                .with_context(|| format!("No active pack provides {}", path))?;
            std::io::stdout().write_all(&bytes)?;
        }
        Command::Activate { id } => {
            registry.activate(&id)?;
            print_active(&registry);
        }
        Command::Deactivate { id } => {
            if !registry.deactivate(&id) {
                anyhow::bail!("Pack '{}' is not active", id);
            }
            print_active(&registry);
        }
        Command::Priority { id, index } => {
            registry.set_priority(&id, index)?;
            print_active(&registry);
        }
        Command::Watch => {
            let watched = Arc::clone(&registry);
            let _watcher = PackWatcher::new(
                &user_root,
                WatcherConfig::DEBOUNCE,
                Box::new(move || match watched.reload() {
                    Ok(report) => info!(
                        "Reloaded: {} packs, {} active, {} paths",
                        report.loaded.len(),
                        report.active.len(),
                        watched.overlay_len()
                    ),
                    Err(e) => tracing::warn!("Reload failed: {}", e),
                }),
            )?;
            info!("Watching {} (Ctrl+C to exit)", user_root.display());
            loop {
                std::thread::park();
            }
        }
    }

    Ok(())
}

fn print_active(registry: &PackRegistry) {
    for (index, id) in registry.active().iter().enumerate() {
        println!("{}\t{}", index, id);
    }
}
