//! Core error types for worklog-core.
//!
//! Validation failures are raised before any state change or I/O. Store
//! failures are propagated to the caller unchanged; nothing here retries.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for worklog-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input rejected before touching state or storage
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Persistence layer failures
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Timer start without a selected category
    #[error("A category must be selected before starting the timer")]
    CategoryRequired,

    /// Operation not allowed from the current timer state
    #[error("Cannot {action} while the timer is {from}")]
    InvalidTransition { from: String, action: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Store-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend rejected or failed the operation
    #[error("{0}")]
    Backend(String),

    /// No entity with the given id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored row could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Data directory could not be resolved or created
    #[error("Failed to prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Unknown dot-separated key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Value does not fit the key's type
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => StoreError::Corrupt(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
