//! BORIS CLI
//!
//! Command-line tools for BORIS OS data.
//!
//! # Commands
//!
//! - `export` - Write a backup bundle
//! - `import` - Restore or merge a backup bundle
//! - `validate` - Check a backup file without importing it
//! - `health` - Show record counts and size estimates
//! - `tombstones` - List soft-deleted records
//! - `restore` - Undo a soft delete
//! - `purge` - Drop tombstones past the retention window

mod commands;

use boris_core::{Config, Database};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// BORIS OS data tools.
#[derive(Parser)]
#[command(name = "boris")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long, env = "BORIS_DB_PATH")]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a backup bundle
    Export {
        /// Output file, or a directory for the default file name
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import a backup bundle
    Import {
        /// Bundle file (.json)
        file: PathBuf,

        /// Upsert into existing data instead of replacing it
        #[arg(short, long)]
        merge: bool,
    },

    /// Validate a backup file without importing it
    Validate {
        /// Bundle file (.json)
        file: PathBuf,
    },

    /// Show record counts and export size estimate
    Health {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List soft-deleted records
    Tombstones {
        /// Only show tombstones of this collection
        #[arg(short, long)]
        store: Option<String>,
    },

    /// Undo a soft delete
    Restore {
        /// Collection of the deleted record
        store: String,

        /// Key of the deleted record
        id: String,
    },

    /// Drop tombstones older than the retention window
    Purge {
        /// Retention window in days (defaults to the configured window)
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Show version information
    Version,
}

fn open(path: Option<&Path>, command: &str) -> Result<Database, Box<dyn std::error::Error>> {
    let path = path.ok_or_else(|| format!("Database path required for {command}"))?;
    // Maintenance commands never create a database by accident.
    let config = Config::default().create_if_missing(false);
    Ok(Database::open_with_config(path, config)?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = cli.path.as_deref();
    match cli.command {
        Commands::Export { out } => {
            let db = open(path, "export")?;
            commands::backup::export(&db, out.as_deref())?;
        }
        Commands::Import { file, merge } => {
            let db = open(path, "import")?;
            commands::backup::import(&db, &file, merge).await?;
        }
        Commands::Validate { file } => match path {
            Some(_) => {
                let db = open(path, "validate")?;
                commands::backup::validate(&db.backups().expectations(), &file)?;
            }
            None => {
                commands::backup::validate(&commands::backup::default_expectations(), &file)?;
            }
        },
        Commands::Health { format } => {
            let db = open(path, "health")?;
            commands::health::run(&db, &format)?;
        }
        Commands::Tombstones { store } => {
            let db = open(path, "tombstones")?;
            commands::tombstones::list(&db, store.as_deref())?;
        }
        Commands::Restore { store, id } => {
            let db = open(path, "restore")?;
            commands::tombstones::restore(&db, &store, &id).await?;
        }
        Commands::Purge { days } => {
            let db = open(path, "purge")?;
            commands::tombstones::purge(&db, days).await?;
        }
        Commands::Version => {
            println!("BORIS CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("BORIS Core v{}", boris_core::VERSION);
        }
    }

    Ok(())
}
