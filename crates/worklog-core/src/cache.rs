//! Local copy of sessions and categories, kept current from store events.
//!
//! Any change notification triggers a full refetch of both collections; the
//! refetched lists replace the cached ones wholesale.

use chrono::{NaiveDate, TimeZone};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::error::StoreError;
use crate::model::{Category, Session};
use crate::stats::{monthly_stats, weekly_stats, PeriodStats};
use crate::store::{Store, StoreEvent};

pub struct DataCache {
    sessions: Vec<Session>,
    categories: Vec<Category>,
    events: broadcast::Receiver<StoreEvent>,
}

impl DataCache {
    /// Subscribe to `store` and fetch the initial snapshot.
    pub fn load<S: Store>(store: &S) -> Result<Self, StoreError> {
        // Subscribe first so nothing between the fetch and now is missed.
        let events = store.subscribe();
        let mut cache = Self {
            sessions: Vec::new(),
            categories: Vec::new(),
            events,
        };
        cache.refresh(store)?;
        Ok(cache)
    }

    /// Unconditional refetch of both collections.
    pub fn refresh<S: Store>(&mut self, store: &S) -> Result<(), StoreError> {
        let sessions = store.list_sessions()?;
        let categories = store.list_categories()?;
        self.sessions = sessions;
        self.categories = categories;
        tracing::debug!(
            sessions = self.sessions.len(),
            categories = self.categories.len(),
            "cache refreshed"
        );
        Ok(())
    }

    /// Drain pending change events and refetch if there were any.
    /// Returns whether a refetch happened.
    pub fn sync<S: Store>(&mut self, store: &S) -> Result<bool, StoreError> {
        let mut stale = false;
        loop {
            match self.events.try_recv() {
                Ok(_) => stale = true,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "cache lagged behind store events");
                    stale = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if stale {
            self.refresh(store)?;
        }
        Ok(stale)
    }

    /// Most recent start first.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Oldest first.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn weekly<Tz: TimeZone>(&self, reference: NaiveDate, tz: &Tz) -> PeriodStats {
        weekly_stats(&self.sessions, &self.categories, reference, tz)
    }

    pub fn monthly<Tz: TimeZone>(&self, reference: NaiveDate, tz: &Tz) -> PeriodStats {
        monthly_stats(&self.sessions, &self.categories, reference, tz)
    }
}
