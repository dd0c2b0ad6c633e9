//! Storage traits and error types
//!
//! This module defines the trait interfaces the crawl coordinator depends
//! on and the associated error type. One backend usually implements all of
//! them; `CrawlStore` names that combination.

use crate::storage::{
    LocationRecord, PersonRecord, QueueItem, QueueStats, RunRecord, RunStatus,
};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persisted person records
pub trait PersonStore {
    /// Inserts a person or updates every field of the existing row
    fn upsert_person(&mut self, person: &PersonRecord) -> StorageResult<()>;

    fn person_exists(&self, wiki_id: &str) -> StorageResult<bool>;

    fn get_person(&self, wiki_id: &str) -> StorageResult<Option<PersonRecord>>;

    fn count_persons(&self) -> StorageResult<u64>;

    /// Every distinct non-blank birth or death location string
    fn distinct_locations(&self) -> StorageResult<Vec<String>>;
}

/// The durable crawl queue
///
/// At most one row exists per WikiTree id, whatever its status.
pub trait QueueStore {
    /// Adds a pending row
    ///
    /// # Returns
    ///
    /// `true` if a row was inserted; `false` if the id was already queued in
    /// any status. An existing row's priority is never changed.
    fn enqueue(&mut self, wiki_id: &str, priority: i64) -> StorageResult<bool>;

    /// Enqueues many ids in one transaction
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted
    fn enqueue_batch(&mut self, items: &[(String, i64)]) -> StorageResult<usize>;

    /// Claims the next pending row
    ///
    /// Highest priority first, then oldest, then insertion order. The row
    /// is flipped to processing in the same transaction.
    fn dequeue(&mut self) -> StorageResult<Option<QueueItem>>;

    fn mark_completed(&mut self, wiki_id: &str) -> StorageResult<()>;

    /// Records a failure and increments the row's retry count
    fn mark_error(&mut self, wiki_id: &str, message: &str) -> StorageResult<()>;

    /// Returns rows left processing by an interrupted run to pending
    ///
    /// # Returns
    ///
    /// The number of rows reset
    fn reset_processing(&mut self) -> StorageResult<u64>;

    fn queue_stats(&self) -> StorageResult<QueueStats>;

    /// True if a row exists for this id in any status
    fn is_queued(&self, wiki_id: &str) -> StorageResult<bool>;

    fn get_queue_item(&self, wiki_id: &str) -> StorageResult<Option<QueueItem>>;

    /// True when no pending rows remain
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.queue_stats()?.pending == 0)
    }
}

/// Geocode results keyed by normalized location key
pub trait GeocodeCache {
    fn has_location(&self, location_key: &str) -> StorageResult<bool>;

    /// Saves an entry unless one exists for its key
    ///
    /// # Returns
    ///
    /// `true` if the entry was inserted
    fn save_location(&mut self, entry: &LocationRecord) -> StorageResult<bool>;

    fn get_location(&self, location_key: &str) -> StorageResult<Option<LocationRecord>>;

    fn count_locations(&self) -> StorageResult<u64>;
}

/// Whole-database snapshots
pub trait SnapshotStore {
    /// Writes a consistent copy of the database to `dest`
    ///
    /// The copy is written next to `dest` and renamed into place, so a
    /// reader never sees a partial file.
    ///
    /// # Returns
    ///
    /// Size of the written file in bytes
    fn dump(&self, dest: &Path) -> StorageResult<u64>;

    /// Replaces the database contents with the snapshot at `src`
    fn restore(&mut self, src: &Path) -> StorageResult<()>;
}

/// The crawl run ledger
pub trait RunStore {
    /// Records a new running crawl
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, seed_id: &str, config_hash: &str) -> StorageResult<i64>;

    /// Sets a run's final status and finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks runs still recorded as running as interrupted
    ///
    /// Only one crawler runs at a time, so a running row seen at startup
    /// belongs to a process that died.
    fn mark_stale_runs_interrupted(&mut self) -> StorageResult<u64>;

    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;
}

/// Everything the crawl coordinator needs from storage
pub trait CrawlStore: PersonStore + QueueStore + GeocodeCache + SnapshotStore + RunStore {}

impl<T> CrawlStore for T where T: PersonStore + QueueStore + GeocodeCache + SnapshotStore + RunStore
{}
