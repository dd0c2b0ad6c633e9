//! Output module for reporting and database snapshots
//!
//! This module handles:
//! - Loading and printing database status
//! - Exporting the database for other tools
//! - Timestamped backups, restore and backup listing

mod snapshot;
pub mod stats;

pub use snapshot::{
    backup_database, backup_file_name, export_database, latest_backup, list_backups,
    restore_database, BackupInfo, SnapshotResult, BACKUP_EXTENSION, BACKUP_PREFIX,
};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use crate::crawler::CrawlOutcome;

/// Prints the end-of-crawl summary to stdout
pub fn print_crawl_summary(outcome: &CrawlOutcome) {
    let summary = outcome.summary();

    if outcome.is_completed() {
        println!("=== Crawl Complete ===\n");
    } else {
        println!("=== Crawl Interrupted ===\n");
    }

    println!("  Seed: {}", summary.seed_id);
    println!("  Total persons: {}", summary.total_persons);
    println!("  API requests: {}", summary.request_count);
    println!("  Processed this run: {}", summary.processed);
    println!("  Errors: {}", summary.errors);
    println!("  Not found: {}", summary.not_found);
    if summary.reset_count > 0 {
        println!("  Recovered from previous run: {}", summary.reset_count);
    }
    println!("  Pending in queue: {}", summary.queue.pending);
    println!("  Elapsed: {:.1}s", summary.elapsed.as_secs_f64());

    if !outcome.is_completed() {
        println!("\nState preserved. Run `funk-tree crawl` again to resume.");
    }
}
