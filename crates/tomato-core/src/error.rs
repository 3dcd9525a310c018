//! Core error types for tomato-core.
//!
//! Validation failures on settings are reported through [`ValidationError`];
//! everything that touches the outside world (storage, config files, imports)
//! funnels into [`CoreError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tomato-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Export/import bundle errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Storage migration from version {from} to {to} failed: {message}")]
    MigrationFailed { from: u32, to: u32, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A document could not be encoded for storage
    #[error("Failed to encode '{key}': {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Backend unavailable (e.g. a test double configured to fail)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors raised by settings mutators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Duration outside `1..=max` seconds
    #[error("{field} must be between 1 and {max} seconds, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        max: u32,
    },

    /// Language tag not in the supported set
    #[error("Unsupported language '{0}'")]
    UnsupportedLanguage(String),

    /// Value of the wrong shape for the field
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors raised by a notifier backend. Never escape the notification
/// contract; they are logged and the alert is dropped.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The platform refused or failed to show the alert
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),

    /// No notification service on this host
    #[error("Notifications are unavailable")]
    Unavailable,
}

/// Errors raised when importing an export bundle.
#[derive(Error, Debug)]
pub enum ImportError {
    /// Bundle is not a JSON object
    #[error("Invalid bundle format: {0}")]
    InvalidFormat(String),

    /// Bundle lacks a numeric version
    #[error("Bundle version is missing or not a number")]
    MissingVersion,

    /// Bundle was written by a newer schema
    #[error("Unsupported bundle version {found} (supported up to {supported})")]
    UnsupportedVersion { found: i64, supported: u32 },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseBusy
                    || inner.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_field() {
        let err = ValidationError::OutOfRange {
            field: "pomodoroLength",
            value: 0,
            max: 3600,
        };
        assert_eq!(
            err.to_string(),
            "pomodoroLength must be between 1 and 3600 seconds, got 0"
        );
    }

    #[test]
    fn storage_error_wraps_into_core_error() {
        let err: CoreError = StorageError::Unavailable("offline".into()).into();
        assert!(matches!(err, CoreError::Storage(StorageError::Unavailable(_))));
        assert_eq!(err.to_string(), "Storage error: Storage unavailable: offline");
    }

    #[test]
    fn busy_database_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(StorageError::from(err), StorageError::Locked));
    }
}
