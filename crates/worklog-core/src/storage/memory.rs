//! In-process store, used by tests and by embedders that sync elsewhere.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Category, CategoryUpdate, NewCategory, NewSession, Session, SessionUpdate};
use crate::store::{Store, StoreEvent, EVENT_CHANNEL_CAPACITY};

#[derive(Debug, Default)]
struct Tables {
    categories: Vec<Category>,
    sessions: Vec<Session>,
    /// When set, every operation fails with this message.
    failure: Option<String>,
}

/// Cloneable handle to a shared in-memory store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            events,
        }
    }

    /// Make every subsequent operation fail with `message`, or clear the
    /// failure with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        self.lock().failure = message.map(str::to_string);
    }

    /// Insert a session as-is, bypassing id and timestamp assignment.
    pub fn insert_session(&self, session: Session) {
        self.lock().sessions.push(session);
        self.emit(StoreEvent::Sessions);
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn checked(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        let guard = self.lock();
        match &guard.failure {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(guard),
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Store for MemoryStore {
    fn create_category(&self, category: NewCategory) -> Result<Category, StoreError> {
        let created = Category {
            id: Uuid::new_v4().to_string(),
            name: category.name,
            color: category.color,
            created_at: Utc::now(),
        };
        self.checked()?.categories.push(created.clone());
        self.emit(StoreEvent::Categories);
        Ok(created)
    }

    fn update_category(&self, id: &str, update: CategoryUpdate) -> Result<Category, StoreError> {
        let updated = {
            let mut tables = self.checked()?;
            let category = tables
                .categories
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "category",
                    id: id.to_string(),
                })?;
            if let Some(name) = update.name {
                category.name = name;
            }
            if let Some(color) = update.color {
                category.color = color;
            }
            category.clone()
        };
        self.emit(StoreEvent::Categories);
        Ok(updated)
    }

    fn delete_category(&self, id: &str) -> Result<(), StoreError> {
        {
            let mut tables = self.checked()?;
            let before = tables.categories.len();
            tables.categories.retain(|c| c.id != id);
            if tables.categories.len() == before {
                return Err(StoreError::NotFound {
                    entity: "category",
                    id: id.to_string(),
                });
            }
            tables.sessions.retain(|s| s.category_id != id);
        }
        self.emit(StoreEvent::Categories);
        self.emit(StoreEvent::Sessions);
        Ok(())
    }

    fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut categories = self.checked()?.categories.clone();
        categories.sort_by_key(|c| c.created_at);
        Ok(categories)
    }

    fn create_session(&self, session: NewSession) -> Result<Session, StoreError> {
        let created = {
            let mut tables = self.checked()?;
            if !tables.categories.iter().any(|c| c.id == session.category_id) {
                return Err(StoreError::NotFound {
                    entity: "category",
                    id: session.category_id,
                });
            }
            let created = Session {
                id: Uuid::new_v4().to_string(),
                category_id: session.category_id,
                start_time: session.start_time,
                end_time: None,
                pause_duration: session.pause_duration,
                total_duration: None,
                created_at: Utc::now(),
            };
            tables.sessions.push(created.clone());
            created
        };
        self.emit(StoreEvent::Sessions);
        Ok(created)
    }

    fn update_session(&self, id: &str, update: SessionUpdate) -> Result<Session, StoreError> {
        let updated = {
            let mut tables = self.checked()?;
            let session = tables
                .sessions
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "session",
                    id: id.to_string(),
                })?;
            if let Some(end_time) = update.end_time {
                session.end_time = Some(end_time);
            }
            if let Some(pause_duration) = update.pause_duration {
                session.pause_duration = pause_duration;
            }
            if let Some(total_duration) = update.total_duration {
                session.total_duration = Some(total_duration);
            }
            session.clone()
        };
        self.emit(StoreEvent::Sessions);
        Ok(updated)
    }

    fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        {
            let mut tables = self.checked()?;
            let before = tables.sessions.len();
            tables.sessions.retain(|s| s.id != id);
            if tables.sessions.len() == before {
                return Err(StoreError::NotFound {
                    entity: "session",
                    id: id.to_string(),
                });
            }
        }
        self.emit(StoreEvent::Sessions);
        Ok(())
    }

    fn open_session(&self) -> Result<Option<Session>, StoreError> {
        Ok(self
            .checked()?
            .sessions
            .iter()
            .filter(|s| s.is_open())
            .max_by_key(|s| s.start_time)
            .cloned())
    }

    fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions = self.checked()?.sessions.clone();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self
            .checked()?
            .sessions
            .iter()
            .filter(|s| s.start_time >= from && s.start_time <= to)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.start_time);
        Ok(sessions)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dev(store: &MemoryStore) -> Category {
        store
            .create_category(NewCategory {
                name: "Dev".into(),
                color: "#3b82f6".into(),
            })
            .unwrap()
    }

    #[test]
    fn delete_category_cascades_to_sessions() {
        let store = MemoryStore::new();
        let cat = dev(&store);
        store
            .create_session(NewSession {
                category_id: cat.id.clone(),
                start_time: Utc::now(),
                pause_duration: 0,
            })
            .unwrap();

        store.delete_category(&cat.id).unwrap();
        assert!(store.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn open_session_picks_latest_open() {
        let store = MemoryStore::new();
        let cat = dev(&store);
        let now = Utc::now();
        let older = store
            .create_session(NewSession {
                category_id: cat.id.clone(),
                start_time: now - Duration::hours(1),
                pause_duration: 0,
            })
            .unwrap();
        store
            .update_session(
                &older.id,
                SessionUpdate {
                    end_time: Some(now),
                    total_duration: Some(3600),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.open_session().unwrap().is_none());

        let newer = store
            .create_session(NewSession {
                category_id: cat.id,
                start_time: now,
                pause_duration: 0,
            })
            .unwrap();
        assert_eq!(store.open_session().unwrap().map(|s| s.id), Some(newer.id));
    }

    #[test]
    fn failure_mode_rejects_operations() {
        let store = MemoryStore::new();
        store.set_failure(Some("offline"));
        let err = store.list_categories().unwrap_err();
        assert_eq!(err, StoreError::Backend("offline".into()));
        store.set_failure(None);
        assert!(store.list_categories().is_ok());
    }

    #[test]
    fn mutations_are_broadcast() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        dev(&store);
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Categories);
    }

    #[test]
    fn session_requires_existing_category() {
        let store = MemoryStore::new();
        let err = store
            .create_session(NewSession {
                category_id: "missing".into(),
                start_time: Utc::now(),
                pause_duration: 0,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "category", .. }));
    }
}
