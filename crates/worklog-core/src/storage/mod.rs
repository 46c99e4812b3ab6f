mod config;
pub mod database;
mod memory;
pub mod migrations;

pub use config::{CategoriesConfig, Config, NotificationsConfig, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `WORKLOG_DATA_DIR` wins when set. Otherwise `~/.config/worklog`, or
/// `~/.config/worklog-dev` when `WORKLOG_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("WORKLOG_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("WORKLOG_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("worklog-dev")
            } else {
                base_dir.join("worklog")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
