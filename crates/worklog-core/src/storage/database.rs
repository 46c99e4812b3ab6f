//! SQLite-based category and session storage.
//!
//! Provides persistent storage for:
//! - Categories and tracked sessions (with cascading deletes)
//! - Key-value store for application state (the saved timer context)

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{data_dir, migrations};
use crate::error::{CoreError, StoreError};
use crate::model::{Category, CategoryUpdate, NewCategory, NewSession, Session, SessionUpdate};
use crate::store::{Store, StoreEvent, EVENT_CHANNEL_CAPACITY};

const SESSION_COLUMNS: &str =
    "id, category_id, start_time, end_time, pause_duration, total_duration, created_at";

/// SQLite database implementing [`Store`].
pub struct Database {
    conn: Connection,
    events: broadcast::Sender<StoreEvent>,
}

impl Database {
    /// Open the database at `<data_dir>/worklog.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("worklog.db");
        Ok(Self::open_at(path)?)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened database");
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self { conn, events })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key from the kv store.
    pub fn kv_delete(&self, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    fn get_category(&self, id: &str) -> Result<Category, StoreError> {
        self.conn
            .query_row(
                "SELECT id, name, color, created_at FROM categories WHERE id = ?1",
                params![id],
                RawCategory::from_row,
            )
            .optional()?
            .ok_or_else(|| not_found("category", id))?
            .decode()
    }

    fn get_session(&self, id: &str) -> Result<Session, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id],
                RawSession::from_row,
            )
            .optional()?
            .ok_or_else(|| not_found("session", id))?
            .decode()
    }

    fn query_sessions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Session>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, RawSession::from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.decode()?);
        }
        Ok(sessions)
    }
}

impl Store for Database {
    fn create_category(&self, category: NewCategory) -> Result<Category, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO categories (id, name, color, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, category.name, category.color, timestamp(Utc::now())],
        )?;
        self.emit(StoreEvent::Categories);
        self.get_category(&id)
    }

    fn update_category(&self, id: &str, update: CategoryUpdate) -> Result<Category, StoreError> {
        let changed = self.conn.execute(
            "UPDATE categories
             SET name = COALESCE(?2, name), color = COALESCE(?3, color)
             WHERE id = ?1",
            params![id, update.name, update.color],
        )?;
        if changed == 0 {
            return Err(not_found("category", id));
        }
        self.emit(StoreEvent::Categories);
        self.get_category(id)
    }

    fn delete_category(&self, id: &str) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(not_found("category", id));
        }
        self.emit(StoreEvent::Categories);
        self.emit(StoreEvent::Sessions);
        Ok(())
    }

    fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color, created_at FROM categories ORDER BY created_at ASC, rowid ASC")?;
        let rows = stmt.query_map([], RawCategory::from_row)?;
        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?.decode()?);
        }
        Ok(categories)
    }

    fn create_session(&self, session: NewSession) -> Result<Session, StoreError> {
        let id = Uuid::new_v4().to_string();
        let result = self.conn.execute(
            "INSERT INTO sessions (id, category_id, start_time, pause_duration, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                session.category_id,
                timestamp(session.start_time),
                session.pause_duration,
                timestamp(Utc::now()),
            ],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                return Err(not_found("category", &session.category_id));
            }
            Err(e) => return Err(e.into()),
        }
        self.emit(StoreEvent::Sessions);
        self.get_session(&id)
    }

    fn update_session(&self, id: &str, update: SessionUpdate) -> Result<Session, StoreError> {
        let changed = self.conn.execute(
            "UPDATE sessions
             SET end_time = COALESCE(?2, end_time),
                 pause_duration = COALESCE(?3, pause_duration),
                 total_duration = COALESCE(?4, total_duration)
             WHERE id = ?1",
            params![
                id,
                update.end_time.map(timestamp),
                update.pause_duration,
                update.total_duration,
            ],
        )?;
        if changed == 0 {
            return Err(not_found("session", id));
        }
        self.emit(StoreEvent::Sessions);
        self.get_session(id)
    }

    fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(not_found("session", id));
        }
        self.emit(StoreEvent::Sessions);
        Ok(())
    }

    fn open_session(&self) -> Result<Option<Session>, StoreError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     WHERE end_time IS NULL
                     ORDER BY start_time DESC LIMIT 1"
                ),
                [],
                RawSession::from_row,
            )
            .optional()?
            .map(RawSession::decode)
            .transpose()
    }

    fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        self.query_sessions(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY start_time DESC"),
            [],
        )
    }

    fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        self.query_sessions(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE start_time >= ?1 AND start_time <= ?2
                 ORDER BY start_time ASC"
            ),
            params![timestamp(from), timestamp(to)],
        )
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// Fixed-width UTC timestamps so text order matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{column} '{value}': {e}")))
}

fn not_found(entity: &'static str, id: &str) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

struct RawCategory {
    id: String,
    name: String,
    color: String,
    created_at: String,
}

impl RawCategory {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn decode(self) -> Result<Category, StoreError> {
        Ok(Category {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            id: self.id,
            name: self.name,
            color: self.color,
        })
    }
}

struct RawSession {
    id: String,
    category_id: String,
    start_time: String,
    end_time: Option<String>,
    pause_duration: u64,
    total_duration: Option<u64>,
    created_at: String,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            category_id: row.get(1)?,
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            pause_duration: row.get(4)?,
            total_duration: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Session, StoreError> {
        Ok(Session {
            start_time: parse_timestamp("start_time", &self.start_time)?,
            end_time: self
                .end_time
                .as_deref()
                .map(|v| parse_timestamp("end_time", v))
                .transpose()?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            id: self.id,
            category_id: self.category_id,
            pause_duration: self.pause_duration,
            total_duration: self.total_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn seed(db: &Database) -> Category {
        db.create_category(NewCategory {
            name: "Dev".into(),
            color: "#3b82f6".into(),
        })
        .unwrap()
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let cat = seed(&db);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();

        let session = db
            .create_session(NewSession {
                category_id: cat.id.clone(),
                start_time: start,
                pause_duration: 0,
            })
            .unwrap();
        assert!(session.is_open());
        assert_eq!(db.open_session().unwrap(), Some(session.clone()));

        let closed = db
            .update_session(
                &session.id,
                SessionUpdate {
                    end_time: Some(start + Duration::minutes(90)),
                    pause_duration: Some(0),
                    total_duration: Some(5400),
                },
            )
            .unwrap();
        assert_eq!(closed.total_duration, Some(5400));
        assert!(db.open_session().unwrap().is_none());
        assert_eq!(db.list_sessions().unwrap().len(), 1);
    }

    #[test]
    fn update_keeps_unspecified_columns() {
        let db = Database::open_memory().unwrap();
        let cat = seed(&db);
        let session = db
            .create_session(NewSession {
                category_id: cat.id,
                start_time: Utc::now(),
                pause_duration: 12,
            })
            .unwrap();
        let updated = db
            .update_session(
                &session.id,
                SessionUpdate {
                    pause_duration: Some(40),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.pause_duration, 40);
        assert!(updated.end_time.is_none());
        assert!(updated.total_duration.is_none());
    }

    #[test]
    fn delete_category_cascades() {
        let db = Database::open_memory().unwrap();
        let cat = seed(&db);
        db.create_session(NewSession {
            category_id: cat.id.clone(),
            start_time: Utc::now(),
            pause_duration: 0,
        })
        .unwrap();
        db.delete_category(&cat.id).unwrap();
        assert!(db.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn unknown_category_is_not_found() {
        let db = Database::open_memory().unwrap();
        let err = db
            .create_session(NewSession {
                category_id: "nope".into(),
                start_time: Utc::now(),
                pause_duration: 0,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "category", .. }));
        assert!(matches!(
            db.update_session("nope", SessionUpdate::default()),
            Err(StoreError::NotFound { entity: "session", .. })
        ));
    }

    #[test]
    fn sessions_between_is_inclusive_and_ascending() {
        let db = Database::open_memory().unwrap();
        let cat = seed(&db);
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for hours in [5, 1, 3, 30] {
            db.create_session(NewSession {
                category_id: cat.id.clone(),
                start_time: base + Duration::hours(hours),
                pause_duration: 0,
            })
            .unwrap();
        }
        let found = db
            .sessions_between(base + Duration::hours(1), base + Duration::hours(5))
            .unwrap();
        let hours: Vec<i64> = found
            .iter()
            .map(|s| (s.start_time - base).num_hours())
            .collect();
        assert_eq!(hours, vec![1, 3, 5]);
    }

    #[test]
    fn category_update_and_order() {
        let db = Database::open_memory().unwrap();
        let first = seed(&db);
        db.create_category(NewCategory {
            name: "Admin".into(),
            color: "#ef4444".into(),
        })
        .unwrap();
        let renamed = db
            .update_category(
                &first.id,
                CategoryUpdate {
                    name: Some("Development".into()),
                    color: None,
                },
            )
            .unwrap();
        assert_eq!(renamed.name, "Development");
        assert_eq!(renamed.color, "#3b82f6");
        let names: Vec<String> = db
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Development", "Admin"]);
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }
}
