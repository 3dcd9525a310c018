//! # Tomato Timer Core Library
//!
//! This library provides the core logic for the Tomato Timer, a Pomodoro
//! timer that tracks work and break intervals, keeps a history of completed
//! sessions and derives statistics from it. The `tomato-cli` binary is a thin
//! layer over the same library.
//!
//! ## Architecture
//!
//! - **Timer**: A one-second-per-tick countdown state machine
//! - **Coordinator**: Owns timer, settings and history; drives ticks and the
//!   completion pipeline (record session, alert, persist)
//! - **Statistics**: Pure aggregation and streaks over the history
//! - **Storage**: SQLite key-value documents plus export/import bundles
//!
//! ## Key Components
//!
//! - [`TimerCoordinator`]: Entry point for every user intent
//! - [`Timer`]: Countdown state machine
//! - [`Settings`]: Validated user preferences
//! - [`StatisticsEngine`]: Today/week/month totals and streaks
//! - [`Storage`]: Trait implemented by [`SqliteStorage`] and [`MemoryStorage`]
//! - [`Notifier`]: Completion alert contract
//! - [`AppConfig`]: Runtime configuration

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
mod lenient;
pub mod notify;
pub mod session;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use coordinator::{TimerCoordinator, TimerCoordinatorBuilder};
pub use error::{ConfigError, CoreError, ImportError, NotifyError, StorageError, ValidationError};
pub use events::Event;
pub use notify::{Alert, EnglishText, IdentityText, LogNotifier, NotificationHandle, Notifier, TextLookup};
pub use session::SessionRecord;
pub use settings::{NotificationPatch, NotificationPrefs, Settings, SettingsPatch, SettingsUpdateReport};
pub use stats::{Statistics, StatisticsEngine, WeekStart};
pub use storage::{ExportBundle, ImportBundle, MemoryStorage, PersistedState, SqliteStorage, Storage};
pub use timer::{IntervalKind, Timer, TimerStatus};
