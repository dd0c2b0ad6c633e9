//! Database snapshots: export, backup, restore and backup listing
//!
//! Every snapshot is a complete SQLite file written through the online
//! backup API, so exports can be opened directly by other tools and backups
//! can be restored into a live database.

use crate::storage::{GeocodeCache, PersonStore, SnapshotStore};
use crate::CrawlerError;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name prefix shared by all timestamped backups
pub const BACKUP_PREFIX: &str = "funk-tree-backup-";

/// File extension of backups
pub const BACKUP_EXTENSION: &str = ".db";

/// Timestamp layout embedded in backup file names (file-system safe)
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// What a snapshot operation wrote or read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotResult {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub person_count: u64,
    pub location_count: u64,
}

/// One backup file found in the backup directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub file_name: String,
    pub path: PathBuf,
    /// `YYYY-MM-DD HH:MM:SS` taken from the file name, or `unknown`
    pub timestamp: String,
    pub size_bytes: u64,
}

/// Builds the backup file name for a point in time
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!(
        "{}{}{}",
        BACKUP_PREFIX,
        at.format(BACKUP_TIMESTAMP_FORMAT),
        BACKUP_EXTENSION
    )
}

/// Extracts the display timestamp from a backup file name
fn parse_backup_timestamp(file_name: &str) -> Option<String> {
    let stamp = file_name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_EXTENSION)?;
    let parsed = NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT).ok()?;
    Some(parsed.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Writes a snapshot of the database to `dest`
///
/// # Arguments
///
/// * `store` - The live database
/// * `dest` - Destination file; replaced atomically if it exists
pub fn export_database<S>(store: &S, dest: &Path) -> Result<SnapshotResult, CrawlerError>
where
    S: SnapshotStore + PersonStore + GeocodeCache + ?Sized,
{
    let person_count = store.count_persons()?;
    let location_count = store.count_locations()?;

    info!(
        dest = %dest.display(),
        persons = person_count,
        locations = location_count,
        "Exporting database"
    );
    let size_bytes = store.dump(dest)?;

    Ok(SnapshotResult {
        path: dest.to_path_buf(),
        size_bytes,
        person_count,
        location_count,
    })
}

/// Writes a backup of the database
///
/// Without an explicit destination the backup goes to
/// `<backup_dir>/funk-tree-backup-<timestamp>.db`.
pub fn backup_database<S>(
    store: &S,
    backup_dir: &Path,
    dest: Option<&Path>,
) -> Result<SnapshotResult, CrawlerError>
where
    S: SnapshotStore + PersonStore + GeocodeCache + ?Sized,
{
    let dest = match dest {
        Some(path) => path.to_path_buf(),
        None => backup_dir.join(backup_file_name(Utc::now())),
    };

    info!(dest = %dest.display(), "Creating backup");
    export_database(store, &dest)
}

/// Lists backups in `backup_dir`, newest first
///
/// A missing directory holds no backups.
pub fn list_backups(backup_dir: &Path) -> Result<Vec<BackupInfo>, CrawlerError> {
    let entries = match fs::read_dir(backup_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !file_name.starts_with(BACKUP_PREFIX) || !file_name.ends_with(BACKUP_EXTENSION) {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        backups.push(BackupInfo {
            timestamp: parse_backup_timestamp(&file_name).unwrap_or_else(|| "unknown".to_string()),
            path: entry.path(),
            size_bytes: metadata.len(),
            file_name,
        });
    }

    // The timestamp format sorts lexicographically
    backups.sort_by(|a, b| b.file_name.cmp(&a.file_name));
    Ok(backups)
}

/// Returns the newest backup in `backup_dir`
///
/// # Errors
///
/// * `CrawlerError::NoBackups` - The directory holds no backups
pub fn latest_backup(backup_dir: &Path) -> Result<BackupInfo, CrawlerError> {
    list_backups(backup_dir)?
        .into_iter()
        .next()
        .ok_or_else(|| CrawlerError::NoBackups(backup_dir.display().to_string()))
}

/// Replaces the live database with a snapshot
///
/// Without an explicit source the newest backup in `backup_dir` is used.
pub fn restore_database<S>(
    store: &mut S,
    backup_dir: &Path,
    src: Option<&Path>,
) -> Result<SnapshotResult, CrawlerError>
where
    S: SnapshotStore + PersonStore + GeocodeCache + ?Sized,
{
    let src = match src {
        Some(path) => path.to_path_buf(),
        None => latest_backup(backup_dir)?.path,
    };

    info!(src = %src.display(), "Restoring database");
    store.restore(&src)?;

    let size_bytes = fs::metadata(&src)?.len();
    Ok(SnapshotResult {
        path: src,
        size_bytes,
        person_count: store.count_persons()?,
        location_count: store.count_locations()?,
    })
}
