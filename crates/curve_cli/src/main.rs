//! CURVE CLI
//!
//! Command-line tools for the CURVE record server and client caches.
//!
//! # Commands
//!
//! - `inspect` - Show record counts per canonical branch
//! - `reset-branch` - Delete every record of a branch
//! - `clean-ghosts` - Remove denylisted ghost records
//! - `sync` - Run the client startup sync for a cache file

mod commands;

use clap::{Parser, Subcommand};
use curve_sync_engine::SyncConfig;
use curve_sync_server::ServerConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CURVE sync administration tools.
#[derive(Parser)]
#[command(name = "curve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show record counts per canonical branch
    Inspect {
        /// Path to the shared record store
        #[arg(short, long)]
        store: PathBuf,

        /// Server configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete every record whose branch matches NAME
    ResetBranch {
        /// Path to the shared record store
        #[arg(short, long)]
        store: PathBuf,

        /// Server configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Branch name; matched loosely
        name: String,
    },

    /// Remove denylisted ghost records from the store
    CleanGhosts {
        /// Path to the shared record store
        #[arg(short, long)]
        store: PathBuf,

        /// Server configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run the client startup sync for a local cache file
    Sync {
        /// Path to the shared record store
        #[arg(short, long)]
        store: PathBuf,

        /// Path to the client cache file
        #[arg(long)]
        cache: PathBuf,

        /// Sync configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    // Logs go to stderr; stdout carries command output only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect {
            store,
            config,
            format,
        } => {
            let config: ServerConfig = commands::load_config(config.as_deref())?;
            commands::inspect::run(&store, config, &format)?;
        }
        Commands::ResetBranch {
            store,
            config,
            name,
        } => {
            let config: ServerConfig = commands::load_config(config.as_deref())?;
            commands::reset_branch::run(&store, config, &name)?;
        }
        Commands::CleanGhosts { store, config } => {
            let config: ServerConfig = commands::load_config(config.as_deref())?;
            commands::clean_ghosts::run(&store, config)?;
        }
        Commands::Sync {
            store,
            cache,
            config,
        } => {
            let config: SyncConfig = commands::load_config(config.as_deref())?;
            commands::sync::run(&store, &cache, config)?;
        }
        Commands::Version => {
            println!("CURVE CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
