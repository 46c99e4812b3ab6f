use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Session;
use crate::notify::NotificationKind;
use crate::timer::TimerState;

/// Every timer state change produces an Event.
/// The CLI prints them; the controller broadcasts them to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        session_id: String,
        category_id: String,
        at: DateTime<Utc>,
    },
    TimerPaused {
        session_id: String,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        session_id: String,
        /// Length of the pause that just ended.
        paused_secs: u64,
        /// Cumulative pause time of the session.
        pause_duration: u64,
        at: DateTime<Utc>,
    },
    /// Carries the finalized, persisted session.
    TimerStopped {
        session: Session,
        at: DateTime<Utc>,
    },
    /// An open session was picked up from the store after a restart.
    TimerRecovered {
        session_id: String,
        category_id: String,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    NotificationFired {
        kind: NotificationKind,
        title: String,
        body: String,
        /// False when permission was missing or alerts are disabled.
        delivered: bool,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        displayed_elapsed: u64,
        selected_category: Option<String>,
        session_id: Option<String>,
        pause_duration: u64,
        at: DateTime<Utc>,
    },
}
