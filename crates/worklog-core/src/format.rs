//! Duration display helpers.

/// Compact form used in reports: `"45min"`, `"2h"`, `"1h05"`.
///
/// Seconds below a full minute are dropped, so anything under 60 renders
/// as `"0min"`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    if hours == 0 {
        return format!("{minutes}min");
    }
    if minutes == 0 {
        return format!("{hours}h");
    }
    format!("{hours}h{minutes:02}")
}

/// Clock form `HH:MM:SS`. Hours are not capped at 24.
pub fn format_duration_full(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
