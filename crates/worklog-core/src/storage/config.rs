//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Notification toggles and alert thresholds
//! - Timer tick interval and default category
//! - Default color for new categories
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;
use crate::notify::Thresholds;

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_long_session_secs")]
    pub long_session_secs: u64,
    #[serde(default = "default_daily_limit_secs")]
    pub daily_limit_secs: u64,
}

/// Timer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Category id or name used by `timer start` when none is given.
    #[serde(default)]
    pub default_category: Option<String>,
}

/// Category defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesConfig {
    #[serde(default = "default_color")]
    pub default_color: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub categories: CategoriesConfig,
}

fn default_true() -> bool {
    true
}
fn default_long_session_secs() -> u64 {
    Thresholds::default().long_session_secs
}
fn default_daily_limit_secs() -> u64 {
    Thresholds::default().daily_limit_secs
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_color() -> String {
    crate::category::PRESET_COLORS[0].into()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            long_session_secs: default_long_session_secs(),
            daily_limit_secs: default_daily_limit_secs(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            default_category: None,
        }
    }
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            default_color: default_color(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    // Optional strings serialize as null until set.
                    serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            long_session_secs: self.notifications.long_session_secs,
            daily_limit_secs: self.notifications.daily_limit_secs,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.timer.tick_interval_ms.max(1))
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("using default configuration: {e}");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert!(parsed.notifications.enabled);
        assert_eq!(parsed.notifications.long_session_secs, 7200);
        assert_eq!(parsed.timer.tick_interval_ms, 1000);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[notifications]\nenabled = false\n").unwrap();
        assert!(!parsed.notifications.enabled);
        assert_eq!(parsed.notifications.daily_limit_secs, 14_400);
        assert_eq!(parsed.categories.default_color, "#3b82f6");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("notifications.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("timer.tick_interval_ms").as_deref(), Some("1000"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn apply_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.apply("notifications.enabled", "false").unwrap();
        cfg.apply("notifications.long_session_secs", "3600").unwrap();
        cfg.apply("timer.default_category", "Dev").unwrap();
        assert!(!cfg.notifications.enabled);
        assert_eq!(cfg.thresholds().long_session_secs, 3600);
        assert_eq!(cfg.timer.default_category.as_deref(), Some("Dev"));
    }

    #[test]
    fn apply_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("timer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.apply("notifications.enabled", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.apply("notifications.daily_limit_secs", "-5"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.timer.tick_interval_ms, 1000);

        let mut changed = cfg.clone();
        changed.apply("categories.default_color", "#ef4444").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(
            Config::load_from(&path).unwrap().categories.default_color,
            "#ef4444"
        );
    }
}
