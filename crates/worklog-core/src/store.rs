//! Persistence capability consumed by the timer and the stats cache.
//!
//! Implementations: [`crate::storage::Database`] (SQLite) and
//! [`crate::storage::MemoryStore`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::model::{Category, CategoryUpdate, NewCategory, NewSession, Session, SessionUpdate};

/// Which collection changed. Subscribers refetch the whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreEvent {
    Categories,
    Sessions,
}

/// Capacity of each store's change channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

pub trait Store {
    fn create_category(&self, category: NewCategory) -> Result<Category, StoreError>;

    fn update_category(&self, id: &str, update: CategoryUpdate) -> Result<Category, StoreError>;

    /// Removes the category and every session that references it.
    fn delete_category(&self, id: &str) -> Result<(), StoreError>;

    /// All categories, oldest first.
    fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    fn create_session(&self, session: NewSession) -> Result<Session, StoreError>;

    fn update_session(&self, id: &str, update: SessionUpdate) -> Result<Session, StoreError>;

    fn delete_session(&self, id: &str) -> Result<(), StoreError>;

    /// The most recently started session without an end time, if any.
    fn open_session(&self) -> Result<Option<Session>, StoreError>;

    /// All sessions, most recent start first.
    fn list_sessions(&self) -> Result<Vec<Session>, StoreError>;

    /// Sessions starting in `[from, to]`, oldest first.
    fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError>;

    /// Change notifications for mutations made through this store.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

macro_rules! forward_store {
    ($ty:ty) => {
        impl<T: Store + ?Sized> Store for $ty {
            fn create_category(&self, category: NewCategory) -> Result<Category, StoreError> {
                (**self).create_category(category)
            }
            fn update_category(
                &self,
                id: &str,
                update: CategoryUpdate,
            ) -> Result<Category, StoreError> {
                (**self).update_category(id, update)
            }
            fn delete_category(&self, id: &str) -> Result<(), StoreError> {
                (**self).delete_category(id)
            }
            fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
                (**self).list_categories()
            }
            fn create_session(&self, session: NewSession) -> Result<Session, StoreError> {
                (**self).create_session(session)
            }
            fn update_session(&self, id: &str, update: SessionUpdate) -> Result<Session, StoreError> {
                (**self).update_session(id, update)
            }
            fn delete_session(&self, id: &str) -> Result<(), StoreError> {
                (**self).delete_session(id)
            }
            fn open_session(&self) -> Result<Option<Session>, StoreError> {
                (**self).open_session()
            }
            fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
                (**self).list_sessions()
            }
            fn sessions_between(
                &self,
                from: DateTime<Utc>,
                to: DateTime<Utc>,
            ) -> Result<Vec<Session>, StoreError> {
                (**self).sessions_between(from, to)
            }
            fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
                (**self).subscribe()
            }
        }
    };
}

forward_store!(&T);
forward_store!(std::sync::Arc<T>);
