//! Database schema definitions and per-connection setup.

use crate::error::{Result, TodoError};
use rusqlite::Connection;
use std::time::Duration;

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Current time as integer microseconds since the Unix epoch, computed by `SQLite`.
///
/// `'now'` is fixed for the duration of one `sqlite3_step`, so both column
/// defaults see the same instant within a single insert.
const NOW_MICROS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER)";

/// The complete SQL schema for the todo database.
///
/// Timestamps are integer microseconds (UTC). `AUTOINCREMENT` keeps ids from
/// being reused after the highest row is deleted.
#[must_use]
pub fn schema_sql() -> String {
    format!(
        r"
    CREATE TABLE IF NOT EXISTS todos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL CHECK (length(trim(title)) > 0),
        completed INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0, 1)),
        created_at INTEGER NOT NULL DEFAULT ({now}),
        updated_at INTEGER NOT NULL DEFAULT ({now}),
        CHECK (updated_at >= created_at)
    );
",
        now = NOW_MICROS_SQL
    )
}

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS`, so this runs on every
/// process start.
///
/// # Errors
///
/// Returns an error if the DDL fails or the database was written by a newer
/// schema version.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(TodoError::Config(format!(
            "database schema version {version} is newer than supported version {CURRENT_SCHEMA_VERSION}"
        )));
    }

    conn.execute_batch(&schema_sql())?;

    // Mark schema as applied.
    conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;

    Ok(())
}

/// Configure a freshly opened connection.
///
/// Runs once per pooled connection, before it is handed out.
///
/// # Errors
///
/// Returns an error if a pragma cannot be set.
pub fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    // First, so that switching the journal mode also waits for the lock.
    conn.busy_timeout(busy_timeout)?;
    // WAL lets readers proceed while a writer holds the lock
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // NORMAL synchronous is safe with WAL: committed data survives OS crash
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn column_names(conn: &Connection) -> HashSet<String> {
        conn.prepare("SELECT name FROM pragma_table_info('todos')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<HashSet<String>>>()
            .unwrap()
    }

    #[test]
    fn test_ensure_schema() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).expect("Failed to apply schema");

        let columns = column_names(&conn);
        for column in ["id", "title", "completed", "created_at", "updated_at"] {
            assert!(columns.contains(column), "missing todos.{column}");
        }
        assert_eq!(columns.len(), 5);

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute("INSERT INTO todos (title) VALUES ('keep me')", [])
            .unwrap();

        ensure_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT count(*) FROM todos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_column_defaults() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute("INSERT INTO todos (title) VALUES ('defaults')", [])
            .unwrap();

        let (completed, created_at, updated_at): (i64, i64, i64) = conn
            .query_row(
                "SELECT completed, created_at, updated_at FROM todos",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(completed, 0);
        assert_eq!(created_at, updated_at);
        // Sanity: after 2020-01-01 in microseconds
        assert!(created_at > 1_577_836_800_000_000);
    }

    #[test]
    fn test_blank_title_violates_check() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let result = conn.execute("INSERT INTO todos (title) VALUES ('   ')", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_newer_schema_version_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION + 1)
            .unwrap();
        let err = ensure_schema(&conn).unwrap_err();
        assert!(matches!(err, TodoError::Config(_)));
    }

    #[test]
    fn test_configure_connection_sets_pragmas() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn, Duration::from_millis(250)).unwrap();

        let foreign_keys: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);

        let busy_timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 250);

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        // In-memory DBs use MEMORY journaling, regardless of what we set
        assert!(
            journal_mode.eq_ignore_ascii_case("wal") || journal_mode.eq_ignore_ascii_case("memory")
        );
    }
}
