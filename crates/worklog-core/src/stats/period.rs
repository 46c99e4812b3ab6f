//! Period statistics over tracked sessions.
//!
//! Sessions are bucketed by the calendar day their `start_time` falls on in
//! the caller's timezone. Only closed sessions (with a `total_duration`)
//! count; an open session stays invisible until it is stopped.

use chrono::{Datelike, Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::model::{Category, Session};

/// Per-category figures within a single day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDayStats {
    pub duration: u64,
    pub count: u64,
}

/// Totals for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_duration: u64,
    pub session_count: u64,
    /// Keyed by category id.
    pub categories: BTreeMap<String, CategoryDayStats>,
}

impl DailyStats {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_duration: 0,
            session_count: 0,
            categories: BTreeMap::new(),
        }
    }
}

/// Totals for one category across the period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category_id: String,
    pub category_name: String,
    pub category_color: String,
    pub total_duration: u64,
    pub session_count: u64,
    pub average_duration: u64,
}

/// Aggregated statistics for an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_duration: u64,
    pub session_count: u64,
    /// One entry per day in the range, ascending.
    pub daily_stats: Vec<DailyStats>,
    /// Only categories with at least one session, in input order.
    pub category_stats: Vec<CategoryStats>,
}

impl PeriodStats {
    /// Mean worked seconds per session.
    pub fn average_session_duration(&self) -> u64 {
        rounded_average(self.total_duration, self.session_count)
    }

    /// Mean worked seconds per calendar day of the period, idle days included.
    pub fn average_daily_duration(&self) -> u64 {
        rounded_average(self.total_duration, self.daily_stats.len() as u64)
    }
}

/// `round(total / count)` with halves rounded up; 0 when `count` is 0.
pub fn rounded_average(total: u64, count: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    (total + count / 2) / count
}

/// Aggregate closed sessions whose start falls on a day in `[start, end]`.
///
/// `tz` decides which calendar day a session belongs to. An inverted range
/// yields an empty period rather than an error.
pub fn calculate_period_stats<Tz: TimeZone>(
    sessions: &[Session],
    categories: &[Category],
    start: NaiveDate,
    end: NaiveDate,
    tz: &Tz,
) -> PeriodStats {
    let in_period: Vec<(NaiveDate, &Session, u64)> = sessions
        .iter()
        .filter_map(|session| {
            let duration = session.total_duration?;
            let day = session.start_time.with_timezone(tz).date_naive();
            (day >= start && day <= end).then_some((day, session, duration))
        })
        .collect();

    let total_duration = in_period.iter().map(|(_, _, d)| d).sum();
    let session_count = in_period.len() as u64;

    let mut days: BTreeMap<NaiveDate, DailyStats> = days_in_range(start, end)
        .map(|day| (day, DailyStats::empty(day)))
        .collect();
    let mut per_category: HashMap<&str, CategoryDayStats> = HashMap::new();

    for (day, session, duration) in &in_period {
        if let Some(daily) = days.get_mut(day) {
            daily.total_duration += duration;
            daily.session_count += 1;
            let entry = daily
                .categories
                .entry(session.category_id.clone())
                .or_default();
            entry.duration += duration;
            entry.count += 1;
        }

        let totals = per_category.entry(session.category_id.as_str()).or_default();
        totals.duration += duration;
        totals.count += 1;
    }

    let category_stats = categories
        .iter()
        .filter_map(|category| {
            let totals = per_category.get(category.id.as_str())?;
            if totals.count == 0 {
                return None;
            }
            Some(CategoryStats {
                category_id: category.id.clone(),
                category_name: category.name.clone(),
                category_color: category.color.clone(),
                total_duration: totals.duration,
                session_count: totals.count,
                average_duration: rounded_average(totals.duration, totals.count),
            })
        })
        .collect();

    PeriodStats {
        start,
        end,
        total_duration,
        session_count,
        daily_stats: days.into_values().collect(),
        category_stats,
    }
}

/// Monday and Sunday of the ISO week containing `reference`, clamped to
/// the representable date range.
pub fn week_bounds(reference: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = reference.weekday().num_days_from_monday() as u64;
    let monday = reference
        .checked_sub_days(Days::new(offset))
        .unwrap_or(NaiveDate::MIN);
    let sunday = monday
        .checked_add_days(Days::new(6))
        .unwrap_or(NaiveDate::MAX);
    (monday, sunday)
}

/// First and last day of the month containing `reference`.
pub fn month_bounds(reference: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = reference.with_day(1).unwrap_or(reference);
    let last = first
        .checked_add_months(chrono::Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX);
    (first, last)
}

/// Statistics for the Monday-to-Sunday week containing `reference`.
pub fn weekly_stats<Tz: TimeZone>(
    sessions: &[Session],
    categories: &[Category],
    reference: NaiveDate,
    tz: &Tz,
) -> PeriodStats {
    let (start, end) = week_bounds(reference);
    calculate_period_stats(sessions, categories, start, end, tz)
}

/// Statistics for the calendar month containing `reference`.
pub fn monthly_stats<Tz: TimeZone>(
    sessions: &[Session],
    categories: &[Category],
    reference: NaiveDate,
    tz: &Tz,
) -> PeriodStats {
    let (start, end) = month_bounds(reference);
    calculate_period_stats(sessions, categories, start, end, tz)
}

fn days_in_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}
