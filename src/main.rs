//! catalog-etl main entry point
//!
//! This is the command-line interface for the catalog ETL pipeline.

use anyhow::Context;
use catalog_etl::config::{load_config_with_hash, Config};
use catalog_etl::output::print_statistics;
use catalog_etl::storage::open_storage;
use catalog_etl::{EntityKind, Pipeline};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// catalog-etl: mirrors the Jikan anime catalog into SQLite
///
/// Discovers anime, manga and character ids page by page, hydrates each id
/// from its detail endpoint and keeps the local copy fresh, all under one
/// global rate limit.
#[derive(Parser, Debug)]
#[command(name = "catalog-etl")]
#[command(version)]
#[command(about = "Rate-limited crawler for the Jikan anime catalog", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when it does not exist)
    #[arg(short, long, value_name = "CONFIG", default_value = "catalog-etl.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show record counts, appearance counts and discovery cursors
    Status,

    /// Delete the discovery cursor of a kind so the next crawl starts at page 1
    Reset {
        /// anime, manga or characters
        kind: EntityKind,
    },

    /// Walk the full catalog of a kind, resuming from its cursor
    Crawl {
        /// anime, manga or characters
        kind: EntityKind,
    },

    /// Re-hydrate the least recently updated records of a kind
    Refresh {
        /// anime, manga or characters
        kind: EntityKind,

        /// Percentage of records to refresh (config default when omitted)
        #[arg(long, value_name = "PERCENT")]
        slice_percent: Option<f64>,
    },

    /// Hydrate a single id
    Hydrate {
        /// anime, manga or characters
        kind: EntityKind,

        /// Upstream id
        mal_id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_configuration(&cli.config)?;

    let storage_path = Path::new(&config.storage.database_path);
    tracing::info!("Database: {}", storage_path.display());
    let storage = open_storage(storage_path)
        .with_context(|| format!("opening database {}", storage_path.display()))?
        .into_shared();

    let pipeline = Pipeline::new(&config, storage)?;

    match cli.command {
        Command::Status => {
            let stats = pipeline.status()?;
            print_statistics(&stats);
        }
        Command::Reset { kind } => {
            if pipeline.reset_cursor(kind)? {
                println!("Cursor {} deleted", kind.cursor_key());
            } else {
                println!("No cursor stored for {}", kind);
            }
        }
        Command::Crawl { kind } => {
            let report = pipeline.crawl(kind).await?;
            println!(
                "Crawled {} {} pages ({}..={}), {} ids discovered",
                report.pages, kind, report.start_page, report.last_page, report.ids_discovered
            );
        }
        Command::Refresh {
            kind,
            slice_percent,
        } => {
            let pct = slice_percent.unwrap_or(config.hydration.default_slice_percent);
            let report = pipeline.refresh(kind, pct).await?;
            println!(
                "Refreshed {} of {} {} records",
                report.selected, report.total, kind
            );
        }
        Command::Hydrate { kind, mal_id } => {
            pipeline
                .hydrate(kind, mal_id)
                .await
                .with_context(|| format!("hydrating {} {}", kind, mal_id))?;
            println!("Hydrated {} {}", kind, mal_id);
        }
    }

    Ok(())
}

/// Loads the config file, or the defaults when it does not exist
fn load_configuration(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::info!("No configuration at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("loading configuration {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_etl=info,warn"),
            1 => EnvFilter::new("catalog_etl=debug,info"),
            2 => EnvFilter::new("catalog_etl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
