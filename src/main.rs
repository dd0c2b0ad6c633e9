//! Funk Tree main entry point
//!
//! This is the command-line interface for the WikiTree genealogy crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use funk_tree_crawler::config::{load_config_with_hash, Config};
use funk_tree_crawler::crawler::run_crawl;
use funk_tree_crawler::geocode::{run_geocode_workflow, MapboxGeocoder};
use funk_tree_crawler::output::{
    backup_database, export_database, list_backups, load_statistics, print_crawl_summary,
    print_statistics, restore_database, SnapshotResult,
};
use funk_tree_crawler::storage::open_storage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Funk Tree: a resumable WikiTree genealogy crawler
///
/// Crawls the WikiTree profile API outward from a seed profile, following
/// spouse, child and (optionally) parent links, and stores every person in
/// a local SQLite database. Interrupted crawls resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "funk-tree")]
#[command(version)]
#[command(about = "A resumable WikiTree genealogy crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
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
    /// Start or resume crawling, then geocode new locations
    Crawl {
        /// WikiTree id to start from (defaults to crawler.start-id)
        #[arg(value_name = "SEED_ID")]
        seed: Option<String>,

        /// Skip geocoding, both during and after the crawl
        #[arg(long)]
        no_geocode: bool,

        /// Skip the backup taken before crawling
        #[arg(long)]
        no_backup: bool,
    },

    /// Show database status
    Status,

    /// Geocode every stored location not yet cached
    Geocode,

    /// Export the database to a standalone SQLite file
    Export {
        /// Destination (defaults to output.export-path)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Write a timestamped backup of the database
    Backup {
        /// Destination (defaults to a timestamped file in output.backup-dir)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Replace the database with a backup
    Restore {
        /// Backup to restore (defaults to the newest in output.backup-dir)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// List available backups, newest first
    ListBackups,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = load_config_with_hash(cli.config.as_deref())
        .context("Failed to load configuration")?;
    match &cli.config {
        Some(path) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            config_hash
        ),
        None => tracing::debug!("No configuration file given, using defaults"),
    }

    match cli.command {
        Command::Crawl {
            seed,
            no_geocode,
            no_backup,
        } => {
            if no_geocode {
                config.geocoding.enabled = false;
            }
            handle_crawl(&config, &config_hash, seed.as_deref(), no_backup).await
        }
        Command::Status => handle_status(&config),
        Command::Geocode => handle_geocode(&config).await,
        Command::Export { path } => handle_export(&config, path.as_deref()),
        Command::Backup { path } => handle_backup(&config, path.as_deref()),
        Command::Restore { path } => handle_restore(&config, path.as_deref()),
        Command::ListBackups => handle_list_backups(&config),
    }
}

/// Filter directives for the binary (`funk_tree`) and the library
fn log_directives(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        // Only show errors
        return "error";
    }
    match verbose {
        0 => "funk_tree=info,funk_tree_crawler=info,warn",
        1 => "funk_tree=debug,funk_tree_crawler=debug,info",
        _ => "funk_tree=trace,funk_tree_crawler=trace,debug",
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_directives(verbose, quiet)))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn database_path(config: &Config) -> &Path {
    Path::new(&config.output.database_path)
}

fn print_snapshot(result: &SnapshotResult) {
    println!("  Path: {}", result.path.display());
    println!(
        "  Size: {:.2} MB",
        result.size_bytes as f64 / 1024.0 / 1024.0
    );
    println!("  Persons: {}", result.person_count);
    println!("  Geocoded locations: {}", result.location_count);
}

/// Resolves when Ctrl-C is pressed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C, crawl cannot be interrupted: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Ctrl-C received, stopping crawl");
}

/// Handles the crawl command
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    seed: Option<&str>,
    no_backup: bool,
) -> anyhow::Result<()> {
    let db_path = database_path(config);

    if !no_backup && db_path.exists() {
        let storage = open_storage(db_path).context("Failed to open database")?;
        match backup_database(&storage, Path::new(&config.output.backup_dir), None) {
            Ok(backup) => tracing::info!(path = %backup.path.display(), "Pre-crawl backup written"),
            Err(e) => tracing::warn!("Pre-crawl backup failed: {}", e),
        }
    }

    tracing::info!(
        seed = seed.unwrap_or(config.crawler.start_id.as_str()),
        database = %db_path.display(),
        "Starting crawl (will resume if an interrupted run exists)"
    );

    let outcome = run_crawl(config, config_hash, seed, shutdown_signal())
        .await
        .context("Crawl failed")?;
    print_crawl_summary(&outcome);

    if outcome.is_completed() && config.geocoding.enabled {
        tracing::info!("Starting automatic geocoding");
        if let Err(e) = geocode(config).await {
            tracing::warn!("Geocoding skipped: {}", e);
        }
    }

    Ok(())
}

async fn geocode(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_storage(database_path(config))?;
    let geocoder = MapboxGeocoder::new(&config.geocoding, &config.api)?;
    let report = run_geocode_workflow(&mut storage, &geocoder).await?;

    println!("\n=== Geocoding Complete ===\n");
    println!("  Locations considered: {}", report.total);
    println!("  Geocoded: {}", report.success);
    println!("  Not found: {}", report.not_found);
    println!("  Failed: {}", report.failed);
    println!("  Already cached: {}", report.skipped);
    Ok(())
}

/// Handles the status command
fn handle_status(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(database_path(config)).context("Failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the geocode command
async fn handle_geocode(config: &Config) -> anyhow::Result<()> {
    geocode(config).await.context("Geocoding failed")
}

/// Handles the export command
fn handle_export(config: &Config, path: Option<&Path>) -> anyhow::Result<()> {
    let dest = path.unwrap_or_else(|| Path::new(&config.output.export_path));
    let storage = open_storage(database_path(config)).context("Failed to open database")?;

    let result = export_database(&storage, dest).context("Export failed")?;
    println!("✓ Database exported");
    print_snapshot(&result);
    Ok(())
}

/// Handles the backup command
fn handle_backup(config: &Config, path: Option<&Path>) -> anyhow::Result<()> {
    let storage = open_storage(database_path(config)).context("Failed to open database")?;

    let result = backup_database(&storage, Path::new(&config.output.backup_dir), path)
        .context("Backup failed")?;
    println!("✓ Backup complete");
    print_snapshot(&result);
    Ok(())
}

/// Handles the restore command
fn handle_restore(config: &Config, path: Option<&Path>) -> anyhow::Result<()> {
    let mut storage =
        open_storage(database_path(config)).context("Failed to open database")?;

    let result = restore_database(&mut storage, Path::new(&config.output.backup_dir), path)
        .context("Restore failed")?;
    println!("✓ Database restored");
    print_snapshot(&result);
    Ok(())
}

/// Handles the list-backups command
fn handle_list_backups(config: &Config) -> anyhow::Result<()> {
    let backup_dir = Path::new(&config.output.backup_dir);
    let backups = list_backups(backup_dir)?;

    if backups.is_empty() {
        println!("No backups found in {}", backup_dir.display());
        return Ok(());
    }

    println!("Backups in {} ({}):", backup_dir.display(), backups.len());
    for backup in &backups {
        println!(
            "  {}  {:>8.2} MB  {}",
            backup.timestamp,
            backup.size_bytes as f64 / 1024.0 / 1024.0,
            backup.file_name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_covers_binary() {
        let directives = log_directives(0, false);
        assert!(directives.contains("funk_tree=info"));
        assert!(directives.contains("funk_tree_crawler=info"));
        assert!(log_directives(1, false).contains("funk_tree=debug"));
        assert_eq!(log_directives(2, true), "error");
    }

    #[test]
    fn test_cli_parses_crawl() {
        let cli = Cli::parse_from(["funk-tree", "-v", "crawl", "Funck-6", "--no-geocode"]);
        assert_eq!(cli.verbose, 1);
        assert!(matches!(
            cli.command,
            Command::Crawl { seed: Some(ref id), no_geocode: true, no_backup: false } if id == "Funck-6"
        ));
    }
}
