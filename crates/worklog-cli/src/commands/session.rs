use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Subcommand;
use worklog_core::{Database, Store};

use super::CliResult;

#[derive(Subcommand)]
pub enum SessionAction {
    /// List recorded sessions as JSON, newest first
    List {
        /// Maximum number of sessions to print
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Only sessions started on this local day (YYYY-MM-DD), oldest first
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a session
    Rm {
        /// Session id
        id: String,
    },
}

/// Start of the local day as UTC; the naive time stands in for a skipped midnight.
fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

pub fn run(action: SessionAction) -> CliResult {
    let db = Database::open()?;

    match action {
        SessionAction::List { limit, date } => {
            let sessions = match date {
                Some(date) => {
                    let from = local_midnight(date);
                    let to = date.succ_opt().map_or(from, |next| {
                        local_midnight(next) - Duration::milliseconds(1)
                    });
                    db.sessions_between(from, to)?
                }
                None => db.list_sessions()?,
            };
            let sessions: Vec<_> = sessions.into_iter().take(limit).collect();
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionAction::Rm { id } => {
            db.delete_session(&id)?;
            println!(
                "{}",
                serde_json::json!({ "type": "session_deleted", "id": id })
            );
        }
    }
    Ok(())
}
