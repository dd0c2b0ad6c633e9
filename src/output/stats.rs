//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying the
//! database status shown by the `status` command.

use crate::storage::{GeocodeCache, PersonStore, QueueStats, QueueStore, RunRecord, RunStore};
use crate::CrawlerError;

/// Database status summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Number of persons stored
    pub total_persons: u64,

    /// Queue rows by status
    pub queue: QueueStats,

    /// Number of cached geocoded locations
    pub geocoded_locations: u64,

    /// The most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// Share of finished queue rows that completed, as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.queue.completed + self.queue.error;
        if finished == 0 {
            return 0.0;
        }
        (self.queue.completed as f64 / finished as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(CrawlerError)` - Failed to query statistics
pub fn load_statistics<S>(storage: &S) -> Result<CrawlStatistics, CrawlerError>
where
    S: PersonStore + QueueStore + GeocodeCache + RunStore + ?Sized,
{
    Ok(CrawlStatistics {
        total_persons: storage.count_persons()?,
        queue: storage.queue_stats()?,
        geocoded_locations: storage.count_locations()?,
        latest_run: storage.latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Database Status ===\n");

    println!("Persons:");
    println!("  Total persons: {}", stats.total_persons);
    println!("  Geocoded locations: {}", stats.geocoded_locations);
    println!();

    println!("Queue:");
    println!("  Pending: {}", stats.queue.pending);
    println!("  Processing: {}", stats.queue.processing);
    println!("  Completed: {}", stats.queue.completed);
    println!("  Errors: {}", stats.queue.error);
    println!("  Total: {}", stats.queue.total);
    println!();

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!("  Id: {}", run.id);
        println!("  Seed: {}", run.seed_id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} queue items completed)",
        stats.success_rate(),
        stats.queue.completed,
        stats.queue.completed + stats.queue.error
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PersonRecord, RunStatus, SqliteStorage};

    #[test]
    fn test_load_statistics_empty() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.total_persons, 0);
        assert_eq!(stats.queue, QueueStats::default());
        assert_eq!(stats.geocoded_locations, 0);
        assert!(stats.latest_run.is_none());
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_person(&PersonRecord {
                wiki_id: "Funck-6".to_string(),
                name: "Heinrich Funck".to_string(),
                ..PersonRecord::default()
            })
            .unwrap();
        storage.enqueue("Funck-7", 0).unwrap();
        storage.enqueue("Funck-8", 0).unwrap();
        storage.enqueue("Funck-9", 0).unwrap();
        storage.dequeue().unwrap();
        storage.mark_completed("Funck-7").unwrap();
        storage.dequeue().unwrap();
        storage.mark_error("Funck-8", "Profile not found").unwrap();
        let run_id = storage.create_run("Funck-6", "abc").unwrap();
        storage.finish_run(run_id, RunStatus::Completed).unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.total_persons, 1);
        assert_eq!(stats.queue.pending, 1);
        assert_eq!(stats.queue.completed, 1);
        assert_eq!(stats.queue.error, 1);
        assert_eq!(stats.queue.total, 3);
        assert_eq!(stats.success_rate(), 50.0);

        let run = stats.latest_run.unwrap();
        assert_eq!(run.seed_id, "Funck-6");
        assert_eq!(run.status, RunStatus::Completed);
    }
}
