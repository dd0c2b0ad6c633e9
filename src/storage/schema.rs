//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crawler database.
//! Every statement is idempotent, so the schema is applied on every open.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seed_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Every person discovered, keyed by WikiTree id
CREATE TABLE IF NOT EXISTS persons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wiki_id TEXT NOT NULL UNIQUE,
    wiki_numeric_id INTEGER,
    name TEXT NOT NULL,
    first_name TEXT,
    middle_name TEXT,
    last_name_birth TEXT,
    last_name_current TEXT,
    suffix TEXT,
    gender TEXT,
    birth_date TEXT,
    death_date TEXT,
    birth_location TEXT,
    birth_location_key TEXT,
    death_location TEXT,
    death_location_key TEXT,
    is_living INTEGER NOT NULL DEFAULT 0,
    generation INTEGER,
    father_wiki_id TEXT,
    mother_wiki_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_persons_birth_location_key ON persons(birth_location_key);
CREATE INDEX IF NOT EXISTS idx_persons_death_location_key ON persons(death_location_key);
CREATE INDEX IF NOT EXISTS idx_persons_father ON persons(father_wiki_id);
CREATE INDEX IF NOT EXISTS idx_persons_mother ON persons(mother_wiki_id);

-- Durable crawl queue; one row per WikiTree id, ever
CREATE TABLE IF NOT EXISTS crawl_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wiki_id TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'pending',
    priority INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    processed_at TEXT,
    error_message TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_crawl_queue_next
    ON crawl_queue(status, priority DESC, created_at ASC);

-- Geocode cache
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    location_key TEXT NOT NULL UNIQUE,
    raw_location TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    normalized_name TEXT,
    country TEXT,
    state TEXT,
    city TEXT,
    geocoded_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Initialize twice
        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        // Should succeed the second time too
        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "persons", "crawl_queue", "locations"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_queue_rejects_duplicate_ids() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO crawl_queue (wiki_id, created_at) VALUES ('Funck-6', 'now')",
            [],
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO crawl_queue (wiki_id, created_at) VALUES ('Funck-6', 'later')",
            [],
        );
        assert!(second.is_err());
    }
}
