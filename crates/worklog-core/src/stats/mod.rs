//! Statistics module for Worklog
//!
//! Buckets tracked sessions into daily, weekly and monthly summaries per
//! category. Everything here is a pure function of its inputs.

mod period;

pub use period::{
    calculate_period_stats, month_bounds, monthly_stats, rounded_average, week_bounds,
    weekly_stats, CategoryDayStats, CategoryStats, DailyStats, PeriodStats,
};
