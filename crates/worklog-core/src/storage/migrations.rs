//! Database schema migrations for worklog.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!("failed to read schema_version: {e}");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: categories, sessions and the key-value table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS categories (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            color       TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id              TEXT PRIMARY KEY,
            category_id     TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            start_time      TEXT NOT NULL,
            end_time        TEXT,
            pause_duration  INTEGER NOT NULL DEFAULT 0 CHECK (pause_duration >= 0),
            total_duration  INTEGER CHECK (total_duration IS NULL OR total_duration >= 0),
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON sessions(start_time);
        CREATE INDEX IF NOT EXISTS idx_sessions_category_id ON sessions(category_id);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: partial index for the open-session lookup.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_sessions_open
            ON sessions(start_time) WHERE end_time IS NULL;",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
