//! Threshold alerts for a running session.
//!
//! Both alerts are edge-triggered: each fires the first time its measure
//! reaches the threshold and never again until a new session starts.

use serde::{Deserialize, Serialize};

/// Alert kinds raised while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Worked time of the current session reached the long-session threshold.
    LongSession,
    /// Worked plus paused time of the current session reached the daily limit.
    ///
    /// Only the current session is measured, not every session of the day.
    DailyLimit,
}

impl NotificationKind {
    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::LongSession => "Long session",
            NotificationKind::DailyLimit => "Daily limit",
        }
    }

    pub fn body(&self, thresholds: &Thresholds) -> String {
        match self {
            NotificationKind::LongSession => format!(
                "You have been working for {} straight. Consider taking a break!",
                hours_label(thresholds.long_session_secs)
            ),
            NotificationKind::DailyLimit => format!(
                "You have worked {} today. Time to rest!",
                hours_label(thresholds.daily_limit_secs)
            ),
        }
    }
}

/// Which alerts already fired for the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFlags {
    pub long_session: bool,
    pub daily_limit: bool,
}

impl NotificationFlags {
    pub fn has_fired(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::LongSession => self.long_session,
            NotificationKind::DailyLimit => self.daily_limit,
        }
    }

    pub fn mark(&mut self, kind: NotificationKind) {
        match kind {
            NotificationKind::LongSession => self.long_session = true,
            NotificationKind::DailyLimit => self.daily_limit = true,
        }
    }
}

/// Alert thresholds in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub long_session_secs: u64,
    pub daily_limit_secs: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            long_session_secs: 2 * 3600,
            daily_limit_secs: 4 * 3600,
        }
    }
}

/// Alerts that should fire now, given what already fired.
pub fn evaluate(
    displayed_elapsed: u64,
    cumulative_paused: u64,
    fired: NotificationFlags,
    thresholds: &Thresholds,
) -> Vec<NotificationKind> {
    let mut due = Vec::new();
    if !fired.long_session && displayed_elapsed >= thresholds.long_session_secs {
        due.push(NotificationKind::LongSession);
    }
    if !fired.daily_limit
        && displayed_elapsed.saturating_add(cumulative_paused) >= thresholds.daily_limit_secs
    {
        due.push(NotificationKind::DailyLimit);
    }
    due
}

fn hours_label(secs: u64) -> String {
    let hours = secs / 3600;
    if secs % 3600 == 0 {
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{hours} hours")
        }
    } else {
        crate::format::format_duration(secs)
    }
}
