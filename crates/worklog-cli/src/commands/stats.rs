use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};
use std::fmt::Write as _;
use worklog_core::{format_duration, format_duration_full, DataCache, Database, PeriodStats};

use super::CliResult;

#[derive(Args)]
pub struct PeriodArgs {
    /// Any day inside the period (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Print a readable summary instead of JSON
    #[arg(long)]
    summary: bool,
}

#[derive(Subcommand)]
pub enum StatsAction {
    /// Monday-to-Sunday week
    Week(PeriodArgs),
    /// Calendar month
    Month(PeriodArgs),
}

pub fn run(action: StatsAction) -> CliResult {
    let db = Database::open()?;
    let cache = DataCache::load(&db)?;
    let today = Local::now().date_naive();

    let (stats, args) = match action {
        StatsAction::Week(args) => (cache.weekly(args.date.unwrap_or(today), &Local), args),
        StatsAction::Month(args) => (cache.monthly(args.date.unwrap_or(today), &Local), args),
    };

    if args.summary {
        print!("{}", summary(&stats));
    } else {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}

fn summary(stats: &PeriodStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} to {}", stats.start, stats.end);
    let _ = writeln!(
        out,
        "Total: {} ({}) in {} sessions",
        format_duration(stats.total_duration),
        format_duration_full(stats.total_duration),
        stats.session_count
    );
    let _ = writeln!(
        out,
        "Average: {} per session, {} per day",
        format_duration(stats.average_session_duration()),
        format_duration(stats.average_daily_duration())
    );

    if !stats.category_stats.is_empty() {
        let _ = writeln!(out, "\nCategories:");
        for cat in &stats.category_stats {
            let _ = writeln!(
                out,
                "  {:<20} {:>8}  {:>3} sessions  avg {}",
                cat.category_name,
                format_duration(cat.total_duration),
                cat.session_count,
                format_duration(cat.average_duration)
            );
        }
    }

    let _ = writeln!(out, "\nDays:");
    for day in &stats.daily_stats {
        let _ = writeln!(
            out,
            "  {} {}  {:>8}",
            day.date.format("%a"),
            day.date,
            format_duration(day.total_duration)
        );
    }
    out
}
