//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of every storage
//! trait. Writes are synchronous; callers never hold a transaction across
//! an await point.

use crate::state::QueueStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    GeocodeCache, PersonStore, QueueStore, RunStore, SnapshotStore, StorageError, StorageResult,
};
use crate::storage::{
    LocationRecord, PersonRecord, QueueItem, QueueStats, RunRecord, RunStatus,
};
use chrono::{SecondsFormat, Utc};
use rusqlite::backup::Progress;
use rusqlite::types::Type;
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Row};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

const QUEUE_COLUMNS: &str =
    "id, wiki_id, status, priority, created_at, processed_at, error_message, retry_count";

const PERSON_COLUMNS: &str = "wiki_id, wiki_numeric_id, name, first_name, middle_name, \
    last_name_birth, last_name_current, suffix, gender, birth_date, death_date, \
    birth_location, birth_location_key, death_location, death_location_key, is_living, \
    generation, father_wiki_id, mother_wiki_id";

/// Timestamp with microsecond precision so queue rows sort in creation order
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    /// Ids dequeued by this process and not yet finished
    in_flight: HashSet<String>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            in_flight: HashSet::new(),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            in_flight: HashSet::new(),
        })
    }

    fn query_queue_item(&self, wiki_id: &str) -> StorageResult<Option<QueueItem>> {
        let sql = format!("SELECT {} FROM crawl_queue WHERE wiki_id = ?1", QUEUE_COLUMNS);
        let item = self
            .conn
            .query_row(&sql, params![wiki_id], queue_item_from_row)
            .optional()?;
        Ok(item)
    }

    /// Rejects a status change the queue lifecycle does not allow
    fn check_transition(&self, wiki_id: &str, next: QueueStatus) -> StorageResult<()> {
        let item = self
            .query_queue_item(wiki_id)?
            .ok_or_else(|| StorageError::NotFound(format!("queue item {}", wiki_id)))?;

        if !item.status.can_transition_to(next) {
            return Err(StorageError::Database(format!(
                "queue item {} cannot move from {} to {}",
                wiki_id, item.status, next
            )));
        }
        Ok(())
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn queue_item_from_row(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    let raw_status: String = row.get(2)?;
    let status = QueueStatus::from_db_string(&raw_status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            Box::new(StorageError::Database(format!(
                "unknown queue status '{}'",
                raw_status
            ))),
        )
    })?;

    Ok(QueueItem {
        id: row.get(0)?,
        wiki_id: row.get(1)?,
        status,
        priority: row.get(3)?,
        created_at: row.get(4)?,
        processed_at: row.get(5)?,
        error_message: row.get(6)?,
        retry_count: row.get::<_, i64>(7)? as u32,
    })
}

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<PersonRecord> {
    Ok(PersonRecord {
        wiki_id: row.get(0)?,
        wiki_numeric_id: row.get(1)?,
        name: row.get(2)?,
        first_name: row.get(3)?,
        middle_name: row.get(4)?,
        last_name_birth: row.get(5)?,
        last_name_current: row.get(6)?,
        suffix: row.get(7)?,
        gender: row.get(8)?,
        birth_date: row.get(9)?,
        death_date: row.get(10)?,
        birth_location: row.get(11)?,
        birth_location_key: row.get(12)?,
        death_location: row.get(13)?,
        death_location_key: row.get(14)?,
        is_living: row.get::<_, i64>(15)? != 0,
        generation: row.get(16)?,
        father_wiki_id: row.get(17)?,
        mother_wiki_id: row.get(18)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        seed_id: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Interrupted),
    })
}

impl PersonStore for SqliteStorage {
    fn upsert_person(&mut self, person: &PersonRecord) -> StorageResult<()> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO persons (
                wiki_id, wiki_numeric_id, name, first_name, middle_name,
                last_name_birth, last_name_current, suffix, gender, birth_date, death_date,
                birth_location, birth_location_key, death_location, death_location_key,
                is_living, generation, father_wiki_id, mother_wiki_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?20)
            ON CONFLICT(wiki_id) DO UPDATE SET
                wiki_numeric_id = excluded.wiki_numeric_id,
                name = excluded.name,
                first_name = excluded.first_name,
                middle_name = excluded.middle_name,
                last_name_birth = excluded.last_name_birth,
                last_name_current = excluded.last_name_current,
                suffix = excluded.suffix,
                gender = excluded.gender,
                birth_date = excluded.birth_date,
                death_date = excluded.death_date,
                birth_location = excluded.birth_location,
                birth_location_key = excluded.birth_location_key,
                death_location = excluded.death_location,
                death_location_key = excluded.death_location_key,
                is_living = excluded.is_living,
                generation = COALESCE(excluded.generation, persons.generation),
                father_wiki_id = excluded.father_wiki_id,
                mother_wiki_id = excluded.mother_wiki_id,
                updated_at = excluded.updated_at",
            params![
                person.wiki_id,
                person.wiki_numeric_id,
                person.name,
                person.first_name,
                person.middle_name,
                person.last_name_birth,
                person.last_name_current,
                person.suffix,
                person.gender,
                person.birth_date,
                person.death_date,
                person.birth_location,
                person.birth_location_key,
                person.death_location,
                person.death_location_key,
                person.is_living,
                person.generation,
                person.father_wiki_id,
                person.mother_wiki_id,
                now,
            ],
        )?;
        Ok(())
    }

    fn person_exists(&self, wiki_id: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM persons WHERE wiki_id = ?1)",
            params![wiki_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_person(&self, wiki_id: &str) -> StorageResult<Option<PersonRecord>> {
        let sql = format!("SELECT {} FROM persons WHERE wiki_id = ?1", PERSON_COLUMNS);
        let person = self
            .conn
            .query_row(&sql, params![wiki_id], person_from_row)
            .optional()?;
        Ok(person)
    }

    fn count_persons(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM persons")
    }

    fn distinct_locations(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT birth_location FROM persons
                WHERE birth_location IS NOT NULL AND TRIM(birth_location) != ''
             UNION
             SELECT death_location FROM persons
                WHERE death_location IS NOT NULL AND TRIM(death_location) != ''
             ORDER BY 1",
        )?;

        let locations = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(locations)
    }
}

impl QueueStore for SqliteStorage {
    fn enqueue(&mut self, wiki_id: &str, priority: i64) -> StorageResult<bool> {
        if self.in_flight.contains(wiki_id) {
            return Ok(false);
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO crawl_queue (wiki_id, status, priority, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                wiki_id,
                QueueStatus::Pending.to_db_string(),
                priority,
                now_timestamp()
            ],
        )?;
        Ok(inserted == 1)
    }

    fn enqueue_batch(&mut self, items: &[(String, i64)]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO crawl_queue (wiki_id, status, priority, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (wiki_id, priority) in items {
                if self.in_flight.contains(wiki_id) {
                    continue;
                }
                inserted += stmt.execute(params![
                    wiki_id,
                    QueueStatus::Pending.to_db_string(),
                    priority,
                    now_timestamp()
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn dequeue(&mut self) -> StorageResult<Option<QueueItem>> {
        let tx = self.conn.transaction()?;

        let sql = format!(
            "SELECT {} FROM crawl_queue WHERE status = ?1
             ORDER BY priority DESC, created_at ASC, id ASC LIMIT 1",
            QUEUE_COLUMNS
        );
        let next = tx
            .query_row(
                &sql,
                params![QueueStatus::Pending.to_db_string()],
                queue_item_from_row,
            )
            .optional()?;

        let Some(mut item) = next else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE crawl_queue SET status = ?1 WHERE id = ?2",
            params![QueueStatus::Processing.to_db_string(), item.id],
        )?;
        tx.commit()?;

        item.status = QueueStatus::Processing;
        self.in_flight.insert(item.wiki_id.clone());
        Ok(Some(item))
    }

    fn mark_completed(&mut self, wiki_id: &str) -> StorageResult<()> {
        self.check_transition(wiki_id, QueueStatus::Completed)?;

        let updated = self.conn.execute(
            "UPDATE crawl_queue SET status = ?1, processed_at = ?2, error_message = NULL
             WHERE wiki_id = ?3 AND status = ?4",
            params![
                QueueStatus::Completed.to_db_string(),
                now_timestamp(),
                wiki_id,
                QueueStatus::Processing.to_db_string()
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("queue item {}", wiki_id)));
        }

        self.in_flight.remove(wiki_id);
        Ok(())
    }

    fn mark_error(&mut self, wiki_id: &str, message: &str) -> StorageResult<()> {
        self.check_transition(wiki_id, QueueStatus::Error)?;

        let updated = self.conn.execute(
            "UPDATE crawl_queue
             SET status = ?1, processed_at = ?2, error_message = ?3, retry_count = retry_count + 1
             WHERE wiki_id = ?4 AND status = ?5",
            params![
                QueueStatus::Error.to_db_string(),
                now_timestamp(),
                message,
                wiki_id,
                QueueStatus::Processing.to_db_string()
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("queue item {}", wiki_id)));
        }

        self.in_flight.remove(wiki_id);
        Ok(())
    }

    fn reset_processing(&mut self) -> StorageResult<u64> {
        let reset = self.conn.execute(
            "UPDATE crawl_queue SET status = ?1 WHERE status = ?2",
            params![
                QueueStatus::Pending.to_db_string(),
                QueueStatus::Processing.to_db_string()
            ],
        )?;
        self.in_flight.clear();
        Ok(reset as u64)
    }

    fn queue_stats(&self) -> StorageResult<QueueStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM crawl_queue GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = QueueStats::default();
        for row in rows {
            let (status, count) = row?;
            let count = count as u64;
            match QueueStatus::from_db_string(&status) {
                Some(QueueStatus::Pending) => stats.pending = count,
                Some(QueueStatus::Processing) => stats.processing = count,
                Some(QueueStatus::Completed) => stats.completed = count,
                Some(QueueStatus::Error) => stats.error = count,
                None => debug!(status = %status, count = count, "Ignoring unknown queue status"),
            }
            stats.total += count;
        }
        Ok(stats)
    }

    fn is_queued(&self, wiki_id: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM crawl_queue WHERE wiki_id = ?1)",
            params![wiki_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_queue_item(&self, wiki_id: &str) -> StorageResult<Option<QueueItem>> {
        self.query_queue_item(wiki_id)
    }

    fn is_empty(&self) -> StorageResult<bool> {
        let pending: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM crawl_queue WHERE status = ?1)",
            params![QueueStatus::Pending.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(!pending)
    }
}

impl GeocodeCache for SqliteStorage {
    fn has_location(&self, location_key: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM locations WHERE location_key = ?1)",
            params![location_key],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn save_location(&mut self, entry: &LocationRecord) -> StorageResult<bool> {
        let geocoded_at = entry.geocoded_at.clone().unwrap_or_else(now_timestamp);
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO locations (
                location_key, raw_location, latitude, longitude, normalized_name,
                country, state, city, geocoded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.location_key,
                entry.raw_location,
                entry.latitude,
                entry.longitude,
                entry.normalized_name,
                entry.country,
                entry.state,
                entry.city,
                geocoded_at,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn get_location(&self, location_key: &str) -> StorageResult<Option<LocationRecord>> {
        let location = self
            .conn
            .query_row(
                "SELECT location_key, raw_location, latitude, longitude, normalized_name,
                        country, state, city, geocoded_at
                 FROM locations WHERE location_key = ?1",
                params![location_key],
                |row| {
                    Ok(LocationRecord {
                        location_key: row.get(0)?,
                        raw_location: row.get(1)?,
                        latitude: row.get(2)?,
                        longitude: row.get(3)?,
                        normalized_name: row.get(4)?,
                        country: row.get(5)?,
                        state: row.get(6)?,
                        city: row.get(7)?,
                        geocoded_at: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(location)
    }

    fn count_locations(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM locations")
    }
}

impl SnapshotStore for SqliteStorage {
    fn dump(&self, dest: &Path) -> StorageResult<u64> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = dest.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = Path::new(&tmp_name);
        if tmp.exists() {
            fs::remove_file(tmp)?;
        }

        self.conn.backup(DatabaseName::Main, tmp, None)?;
        fs::rename(tmp, dest)?;

        let size = fs::metadata(dest)?.len();
        debug!(dest = %dest.display(), bytes = size, "Database snapshot written");
        Ok(size)
    }

    fn restore(&mut self, src: &Path) -> StorageResult<()> {
        if !src.is_file() {
            return Err(StorageError::NotFound(format!(
                "snapshot {}",
                src.display()
            )));
        }

        self.conn
            .restore(DatabaseName::Main, src, None::<fn(Progress)>)?;
        self.in_flight.clear();

        // Snapshots written by older builds may lack newer tables
        initialize_schema(&self.conn)?;
        Ok(())
    }
}

impl RunStore for SqliteStorage {
    fn create_run(&mut self, seed_id: &str, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (seed_id, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                seed_id,
                now_timestamp(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now_timestamp(), run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::NotFound(format!("run {}", run_id)));
        }
        Ok(())
    }

    fn mark_stale_runs_interrupted(&mut self) -> StorageResult<u64> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE status = ?2",
            params![
                RunStatus::Interrupted.to_db_string(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(updated as u64)
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, seed_id, started_at, finished_at, config_hash, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }
}
