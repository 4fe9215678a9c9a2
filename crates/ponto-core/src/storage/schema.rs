//! SQLite schemas for the local queue and the proxy cache
//!
//! The two stores live in separate database files so the caching proxy
//! can run without the queue and vice versa. Both carry a `schema_info`
//! table for version tracking.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the pending-event queue schema
pub fn init_queue_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- AUTOINCREMENT guarantees ids are never reused, even after purge
        CREATE TABLE IF NOT EXISTS pending_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            clock_type TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            photo TEXT,
            created_at INTEGER NOT NULL,
            sync_status TEXT NOT NULL DEFAULT 'pending'
        );

        CREATE INDEX IF NOT EXISTS idx_pending_events_status ON pending_events(sync_status);
        CREATE INDEX IF NOT EXISTS idx_pending_events_created_at ON pending_events(created_at);
        "#,
    )?;

    set_schema_version(conn)
}

/// Initialize the cache generation schema
pub fn init_cache_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cache_generations (
            name TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cache_entries (
            generation TEXT NOT NULL,
            request_key TEXT NOT NULL,
            status INTEGER NOT NULL,
            headers TEXT NOT NULL,
            body BLOB NOT NULL,
            stored_at INTEGER NOT NULL,
            PRIMARY KEY (generation, request_key),
            FOREIGN KEY (generation) REFERENCES cache_generations(name) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_cache_entries_request_key ON cache_entries(request_key);
        "#,
    )?;

    set_schema_version(conn)
}

fn set_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_init_queue_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_queue_schema(&conn).unwrap();

        let tables = table_names(&conn);
        assert!(tables.contains(&"pending_events".to_string()));
        assert!(tables.contains(&"schema_info".to_string()));
    }

    #[test]
    fn test_init_cache_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_cache_schema(&conn).unwrap();

        let tables = table_names(&conn);
        assert!(tables.contains(&"cache_generations".to_string()));
        assert!(tables.contains(&"cache_entries".to_string()));
    }

    #[test]
    fn test_schema_version() {
        let conn = Connection::open_in_memory().unwrap();

        assert!(needs_init(&conn));

        init_queue_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        assert!(!needs_init(&conn));
    }

    #[test]
    fn test_init_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        init_queue_schema(&conn).unwrap();
        init_queue_schema(&conn).unwrap();
        init_cache_schema(&conn).unwrap();
        init_cache_schema(&conn).unwrap();
    }
}
