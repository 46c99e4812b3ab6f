//! Persisted entities: categories and tracked sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-defined label with a display color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Hex color, e.g. `#3b82f6`.
    pub color: String,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for [`Category`]; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
}

/// Partial update for [`Category`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// One block of tracked work against a single category.
///
/// Open while `end_time` is `None`. `total_duration` is set together with
/// `end_time` when the session is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub category_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Cumulative paused seconds.
    pub pause_duration: u64,
    /// Worked seconds, excluding pauses.
    pub total_duration: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Insert shape for [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub category_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub pause_duration: u64,
}

/// Partial update for [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
}

/// Worked seconds between `start` and `end` minus `pause_duration`, never negative.
pub fn worked_seconds(start: DateTime<Utc>, end: DateTime<Utc>, pause_duration: u64) -> u64 {
    let span = (end - start).num_seconds().max(0) as u64;
    span.saturating_sub(pause_duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    #[test]
    fn worked_seconds_subtracts_pauses() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let t1 = t0 + Duration::minutes(90);
        assert_eq!(worked_seconds(t0, t1, 0), 5400);
        assert_eq!(worked_seconds(t0, t1, 600), 4800);
    }

    #[test]
    fn worked_seconds_clamps_to_zero() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(worked_seconds(t0, t0 + Duration::seconds(30), 60), 0);
        assert_eq!(worked_seconds(t0, t0 - Duration::seconds(30), 0), 0);
    }

    proptest! {
        #[test]
        fn worked_seconds_is_clamped_difference(span in 0i64..1_000_000, pause in 0u64..1_000_000) {
            let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let t1 = t0 + Duration::seconds(span);
            let expected = (span - pause as i64).max(0) as u64;
            prop_assert_eq!(worked_seconds(t0, t1, pause), expected);
        }
    }
}
