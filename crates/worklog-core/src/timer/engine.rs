//! Session timer state machine.
//!
//! The timer is wall-clock based. It does not use internal threads - the
//! caller is responsible for calling `tick()` periodically while running
//! (see [`super::TimerController`] for an async driver).
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//! Running | Paused --stop--> Idle   (emits the finalized session)
//! ```
//!
//! Every transition that touches storage waits for the store's answer and
//! leaves the state untouched when it fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::clock::{Clock, SystemClock};
use crate::error::{CoreError, ValidationError};
use crate::events::Event;
use crate::model::{worked_seconds, NewSession, Session, SessionUpdate};
use crate::notify::{self, NotificationFlags, Notifier, Thresholds};
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Idle,
    Running,
    Paused,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
        })
    }
}

/// Serializable timer state, independent of the injected capabilities.
///
/// Saved between CLI invocations and handed back through
/// [`SessionTimer::restore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerContext {
    pub state: TimerState,
    /// The open session while running or paused.
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub pause_started_at: Option<DateTime<Utc>>,
    /// Cumulative paused seconds of the open session.
    #[serde(default)]
    pub pause_duration: u64,
    /// Worked seconds as of the last tick.
    #[serde(default)]
    pub displayed_elapsed: u64,
    #[serde(default)]
    pub selected_category: Option<String>,
    #[serde(default)]
    pub flags: NotificationFlags,
}

/// What display code needs to render the timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub displayed_elapsed: u64,
    pub selected_category: Option<String>,
    pub session_id: Option<String>,
    pub pause_duration: u64,
}

/// Single active session timer with injected store, notifier and clock.
pub struct SessionTimer<S, N, C = SystemClock> {
    ctx: TimerContext,
    store: S,
    notifier: N,
    clock: C,
    thresholds: Thresholds,
    notifications_enabled: bool,
}

impl<S: Store, N: Notifier, C: Clock> SessionTimer<S, N, C> {
    /// Create an idle timer.
    pub fn new(store: S, notifier: N, clock: C) -> Self {
        Self {
            ctx: TimerContext::default(),
            store,
            notifier,
            clock,
            thresholds: Thresholds::default(),
            notifications_enabled: true,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.ctx.state
    }

    pub fn context(&self) -> &TimerContext {
        &self.ctx
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.ctx.session.as_ref()
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.ctx.selected_category.as_deref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Worked seconds right now; frozen at the pause start while paused.
    pub fn displayed_elapsed(&self) -> u64 {
        self.elapsed_at(self.clock.now())
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            state: self.ctx.state,
            displayed_elapsed: self.displayed_elapsed(),
            selected_category: self.ctx.selected_category.clone(),
            session_id: self.ctx.session.as_ref().map(|s| s.id.clone()),
            pause_duration: self.ctx.pause_duration,
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot_event(&self) -> Event {
        let snap = self.snapshot();
        Event::StateSnapshot {
            state: snap.state,
            displayed_elapsed: snap.displayed_elapsed,
            selected_category: snap.selected_category,
            session_id: snap.session_id,
            pause_duration: snap.pause_duration,
            at: self.clock.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Reconstruct state from the store's open session, if any.
    ///
    /// Any pause in progress before the restart is lost; the recovered
    /// session resumes as running with its stored `pause_duration`.
    pub fn recover(&mut self) -> Result<Option<Event>, CoreError> {
        let open = self.store.open_session()?;
        let selected = self.ctx.selected_category.take();
        self.ctx = TimerContext {
            selected_category: selected,
            ..TimerContext::default()
        };

        let Some(session) = open else {
            tracing::debug!("no open session to recover");
            return Ok(None);
        };

        let now = self.clock.now();
        self.ctx.state = TimerState::Running;
        self.ctx.pause_duration = session.pause_duration;
        self.ctx.selected_category = Some(session.category_id.clone());
        self.ctx.displayed_elapsed =
            worked_seconds(session.start_time, now, session.pause_duration);
        tracing::info!(
            session_id = %session.id,
            elapsed = self.ctx.displayed_elapsed,
            "recovered open session"
        );
        let event = Event::TimerRecovered {
            session_id: session.id.clone(),
            category_id: session.category_id.clone(),
            elapsed_secs: self.ctx.displayed_elapsed,
            at: now,
        };
        self.ctx.session = Some(session);
        Ok(Some(event))
    }

    /// Adopt a previously saved context if it still matches the store's
    /// open session; otherwise fall back to [`Self::recover`].
    pub fn restore(&mut self, saved: TimerContext) -> Result<Option<Event>, CoreError> {
        let open = self.store.open_session()?;
        let matches = match (&saved.session, &open) {
            (Some(saved_session), Some(open)) => {
                saved_session.id == open.id && saved.state != TimerState::Idle
            }
            (None, None) => saved.state == TimerState::Idle,
            _ => false,
        };

        if !matches {
            if saved.session.is_some() || open.is_some() {
                tracing::warn!("saved timer context does not match the store; recovering");
            }
            self.ctx.selected_category = saved.selected_category;
            return self.recover();
        }

        self.ctx = saved;
        if let (Some(session), Some(open)) = (self.ctx.session.as_mut(), open) {
            self.ctx.pause_duration = self.ctx.pause_duration.max(open.pause_duration);
            *session = open;
        }
        self.ctx.displayed_elapsed = self.displayed_elapsed();
        tracing::debug!(state = %self.ctx.state, "restored timer context");
        Ok(None)
    }

    /// Open a new session for `category_id` and start running.
    ///
    /// # Errors
    /// `ValidationError::CategoryRequired` for an empty id,
    /// `ValidationError::InvalidTransition` when a session is already active
    /// here or open in the store, or the store's error if the session could
    /// not be created. The timer stays idle on every error.
    pub fn start(&mut self, category_id: &str) -> Result<Event, CoreError> {
        let category_id = category_id.trim();
        if category_id.is_empty() {
            return Err(ValidationError::CategoryRequired.into());
        }
        if self.ctx.state != TimerState::Idle {
            return Err(ValidationError::InvalidTransition {
                from: self.ctx.state.to_string(),
                action: "start".into(),
            }
            .into());
        }
        if let Some(open) = self.store.open_session()? {
            tracing::warn!(session_id = %open.id, "refusing to start over an open session");
            return Err(ValidationError::InvalidTransition {
                from: TimerState::Running.to_string(),
                action: "start".into(),
            }
            .into());
        }

        let now = self.clock.now();
        let session = self
            .store
            .create_session(NewSession {
                category_id: category_id.to_string(),
                start_time: now,
                pause_duration: 0,
            })
            .map_err(|e| {
                tracing::warn!("failed to create session: {e}");
                e
            })?;

        tracing::info!(session_id = %session.id, category_id, "timer started");
        let event = Event::TimerStarted {
            session_id: session.id.clone(),
            category_id: category_id.to_string(),
            at: now,
        };
        self.ctx = TimerContext {
            state: TimerState::Running,
            session: Some(session),
            selected_category: Some(category_id.to_string()),
            ..TimerContext::default()
        };
        Ok(event)
    }

    /// Pause a running timer. On a paused timer this acts as [`Self::resume`],
    /// so one control can drive both. No-op when idle.
    ///
    /// # Errors
    /// The store's error when resuming; the timer then stays paused.
    pub fn pause(&mut self) -> Result<Option<Event>, CoreError> {
        match self.ctx.state {
            TimerState::Idle => return Ok(None),
            TimerState::Paused => return self.resume(),
            TimerState::Running => {}
        }
        let now = self.clock.now();
        self.ctx.displayed_elapsed = self.elapsed_at(now);
        self.ctx.state = TimerState::Paused;
        self.ctx.pause_started_at = Some(now);
        tracing::debug!(elapsed = self.ctx.displayed_elapsed, "timer paused");
        Ok(Some(Event::TimerPaused {
            session_id: self.session_id(),
            elapsed_secs: self.ctx.displayed_elapsed,
            at: now,
        }))
    }

    /// Resume a paused timer, persisting the grown `pause_duration`.
    /// No-op in any other state.
    ///
    /// # Errors
    /// The store's error; the timer then stays paused.
    pub fn resume(&mut self) -> Result<Option<Event>, CoreError> {
        if self.ctx.state != TimerState::Paused {
            return Ok(None);
        }
        let now = self.clock.now();
        let paused_secs = self.current_pause_secs(now);
        let pause_duration = self.ctx.pause_duration + paused_secs;

        let session_id = self.session_id();
        let updated = self
            .store
            .update_session(
                &session_id,
                SessionUpdate {
                    pause_duration: Some(pause_duration),
                    ..SessionUpdate::default()
                },
            )
            .map_err(|e| {
                tracing::warn!(%session_id, "failed to persist pause: {e}");
                e
            })?;

        self.ctx.session = Some(updated);
        self.ctx.pause_duration = pause_duration;
        self.ctx.pause_started_at = None;
        self.ctx.state = TimerState::Running;
        self.ctx.displayed_elapsed = self.elapsed_at(now);
        tracing::debug!(paused_secs, pause_duration, "timer resumed");
        Ok(Some(Event::TimerResumed {
            session_id,
            paused_secs,
            pause_duration,
            at: now,
        }))
    }

    /// Close the active session. A pause in progress is folded in first.
    /// No-op when idle.
    ///
    /// # Errors
    /// The store's error; the timer then keeps its current state.
    pub fn stop(&mut self) -> Result<Option<Event>, CoreError> {
        if self.ctx.state == TimerState::Idle {
            return Ok(None);
        }
        let Some(session) = self.ctx.session.as_ref() else {
            // Active state without a session cannot be finalized; drop it.
            tracing::warn!("active timer had no session; resetting");
            self.reset();
            return Ok(None);
        };

        let now = self.clock.now();
        let pause_duration = self.ctx.pause_duration + self.current_pause_secs(now);
        let total_duration = worked_seconds(session.start_time, now, pause_duration);

        let closed = self
            .store
            .update_session(
                &session.id,
                SessionUpdate {
                    end_time: Some(now),
                    pause_duration: Some(pause_duration),
                    total_duration: Some(total_duration),
                },
            )
            .map_err(|e| {
                tracing::warn!(session_id = %session.id, "failed to close session: {e}");
                e
            })?;

        tracing::info!(session_id = %closed.id, total_duration, "timer stopped");
        self.reset();
        Ok(Some(Event::TimerStopped {
            session: closed,
            at: now,
        }))
    }

    /// Refresh the elapsed counter from the wall clock and fire due alerts.
    /// Returns nothing unless running.
    pub fn tick(&mut self) -> Vec<Event> {
        if self.ctx.state != TimerState::Running {
            return Vec::new();
        }
        let now = self.clock.now();
        self.ctx.displayed_elapsed = self.elapsed_at(now);

        let due = notify::evaluate(
            self.ctx.displayed_elapsed,
            self.ctx.pause_duration,
            self.ctx.flags,
            &self.thresholds,
        );

        let mut events = Vec::with_capacity(due.len());
        for kind in due {
            self.ctx.flags.mark(kind);
            let title = kind.title();
            let body = kind.body(&self.thresholds);
            let delivered = self.notifications_enabled && self.notifier.permission_granted();
            if delivered {
                self.notifier.notify(title, &body);
            }
            tracing::info!(?kind, delivered, "notification due");
            events.push(Event::NotificationFired {
                kind,
                title: title.to_string(),
                body,
                delivered,
                at: now,
            });
        }
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        let Some(session) = &self.ctx.session else {
            return 0;
        };
        let until = match (self.ctx.state, self.ctx.pause_started_at) {
            (TimerState::Paused, Some(pause_start)) => pause_start,
            _ => now,
        };
        worked_seconds(session.start_time, until, self.ctx.pause_duration)
    }

    /// Whole seconds of the pause in progress, rounded down.
    fn current_pause_secs(&self, now: DateTime<Utc>) -> u64 {
        match (self.ctx.state, self.ctx.pause_started_at) {
            (TimerState::Paused, Some(start)) => {
                ((now - start).num_milliseconds() / 1000).max(0) as u64
            }
            _ => 0,
        }
    }

    fn session_id(&self) -> String {
        self.ctx
            .session
            .as_ref()
            .map(|s| s.id.clone())
            .unwrap_or_default()
    }

    fn reset(&mut self) {
        let selected = self.ctx.selected_category.take();
        self.ctx = TimerContext {
            selected_category: selected,
            ..TimerContext::default()
        };
    }
}
