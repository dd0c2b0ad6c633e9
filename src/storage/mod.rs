//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Person upserts keyed by WikiTree id
//! - The durable, crash-recoverable crawl queue
//! - The geocode cache
//! - Snapshots (export, backup, restore) through SQLite's online backup API
//! - Run tracking and resumption support

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{
    CrawlStore, GeocodeCache, PersonStore, QueueStore, RunStore, SnapshotStore, StorageError,
    StorageResult,
};

use crate::state::QueueStatus;
use std::path::Path;

/// Initializes or opens a storage database
///
/// Missing parent directories are created.
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// One person as stored in the database
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonRecord {
    /// WikiTree id, e.g. `Funck-6`
    pub wiki_id: String,
    pub wiki_numeric_id: Option<i64>,
    /// Derived display name
    pub name: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name_birth: Option<String>,
    pub last_name_current: Option<String>,
    pub suffix: Option<String>,
    pub gender: Option<String>,
    /// Opaque date text; partial dates like `1690-00-00` are kept as-is
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
    pub birth_location: Option<String>,
    pub birth_location_key: Option<String>,
    pub death_location: Option<String>,
    pub death_location_key: Option<String>,
    pub is_living: bool,
    /// Informational only; nothing in the crawl depends on it
    pub generation: Option<i64>,
    pub father_wiki_id: Option<String>,
    pub mother_wiki_id: Option<String>,
}

/// One row of the crawl queue
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: i64,
    pub wiki_id: String,
    pub status: QueueStatus,
    /// Higher is fetched sooner
    pub priority: i64,
    pub created_at: String,
    pub processed_at: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

/// Queue row counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub error: u64,
    pub total: u64,
}

/// A cached geocode result
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    /// Normalized location key; identity of the entry
    pub location_key: String,
    /// First raw place string seen for this key
    pub raw_location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub normalized_name: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub geocoded_at: Option<String>,
}

/// Represents a crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: i64,
    pub seed_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
