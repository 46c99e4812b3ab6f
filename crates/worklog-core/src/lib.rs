//! # Worklog Core Library
//!
//! This library provides the core logic for Worklog, a per-category work-time
//! tracker. The `worklog` CLI is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Session Timer**: A wall-clock-based state machine that requires the caller
//!   to periodically invoke `tick()` for progress updates and alerts
//! - **Statistics**: Pure aggregation of sessions into daily, weekly and monthly
//!   summaries per category
//! - **Storage**: SQLite-based session storage behind the [`Store`] trait, and
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SessionTimer`]: Core timer state machine
//! - [`TimerController`]: Async tick loop and event fan-out
//! - [`Database`]: Category and session persistence
//! - [`Config`]: Application configuration management
//! - [`Notifier`]: Sink for long-session and daily-limit alerts

pub mod cache;
pub mod category;
pub mod error;
pub mod events;
pub mod format;
pub mod model;
pub mod notify;
pub mod stats;
pub mod storage;
pub mod store;
pub mod timer;

pub use cache::DataCache;
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use events::Event;
pub use format::{format_duration, format_duration_full};
pub use model::{Category, CategoryUpdate, NewCategory, NewSession, Session, SessionUpdate};
pub use notify::{LogNotifier, NotificationKind, Notifier, SilentNotifier, Thresholds};
pub use stats::{CategoryStats, DailyStats, PeriodStats};
pub use storage::{Config, Database, MemoryStore};
pub use store::{Store, StoreEvent};
pub use timer::{
    Clock, ManualClock, SessionTimer, SystemClock, TimerController, TimerContext, TimerSnapshot,
    TimerState,
};
