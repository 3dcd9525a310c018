//! Persistence of settings, session history and the current timer.
//!
//! Backends store four JSON documents under fixed keys. Decoding is lenient
//! per key: a malformed document falls back to its default and is logged,
//! it never fails the load.

mod memory;
mod sqlite;
mod transfer;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use transfer::{ExportBundle, ImportBundle, BUNDLE_VERSION};

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, StorageError};
use crate::session::SessionRecord;
use crate::settings::Settings;
use crate::timer::Timer;

pub const SETTINGS_KEY: &str = "tomato-timer-settings";
pub const SESSIONS_KEY: &str = "tomato-timer-sessions";
pub const TIMER_KEY: &str = "tomato-timer-current-timer";
pub const VERSION_KEY: &str = "tomato-timer-version";

pub const ALL_KEYS: [&str; 4] = [SETTINGS_KEY, SESSIONS_KEY, TIMER_KEY, VERSION_KEY];

/// Layout version of the stored documents.
pub const STORAGE_VERSION: u32 = 1;

/// Everything a backend holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub settings: Settings,
    pub sessions: Vec<SessionRecord>,
    pub timer: Option<Timer>,
}

/// Storage contract used by the coordinator.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load all documents. Malformed content degrades to defaults; only
    /// backend faults are errors.
    async fn load_all(&self) -> Result<PersistedState, StorageError>;

    /// Replace all documents at once. `timer = None` removes the stored timer.
    async fn save_all(
        &self,
        settings: &Settings,
        sessions: &[SessionRecord],
        timer: Option<&Timer>,
    ) -> Result<(), StorageError>;

    async fn clear_all(&self) -> Result<(), StorageError>;
}

/// Returns `~/.config/tomato-timer[-dev]/` based on TOMATO_ENV.
///
/// `TOMATO_DATA_DIR` overrides the location entirely. The directory is
/// created if missing.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("TOMATO_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("TOMATO_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("tomato-timer-dev")
            } else {
                base_dir.join("tomato-timer")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// The documents of one `save_all`, serialized.
pub(crate) struct EncodedState {
    pub settings: String,
    pub sessions: String,
    pub timer: Option<String>,
}

pub(crate) fn encode_state(
    settings: &Settings,
    sessions: &[SessionRecord],
    timer: Option<&Timer>,
) -> Result<EncodedState, StorageError> {
    let settings = serde_json::to_string(settings).map_err(|source| StorageError::Encode {
        key: SETTINGS_KEY,
        source,
    })?;
    let sessions = serde_json::to_string(sessions).map_err(|source| StorageError::Encode {
        key: SESSIONS_KEY,
        source,
    })?;
    let timer = timer
        .map(serde_json::to_string)
        .transpose()
        .map_err(|source| StorageError::Encode {
            key: TIMER_KEY,
            source,
        })?;
    Ok(EncodedState {
        settings,
        sessions,
        timer,
    })
}

/// Decode the raw documents, falling back per key.
pub(crate) fn decode_state(
    settings: Option<&str>,
    sessions: Option<&str>,
    timer: Option<&str>,
) -> PersistedState {
    PersistedState {
        settings: settings
            .and_then(|raw| parse_document(SETTINGS_KEY, raw))
            .map(Settings::from)
            .unwrap_or_default(),
        sessions: sessions
            .and_then(|raw| parse_document(SESSIONS_KEY, raw))
            .map(decode_sessions)
            .unwrap_or_default(),
        timer: timer
            .and_then(|raw| parse_document(TIMER_KEY, raw))
            .and_then(decode_timer),
    }
}

fn parse_document(key: &str, raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding unreadable stored document");
            None
        }
    }
}

pub(crate) fn decode_sessions(value: Value) -> Vec<SessionRecord> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .map(SessionRecord::from)
            .collect(),
        other => {
            tracing::warn!(found = %json_kind(&other), "session history is not an array");
            Vec::new()
        }
    }
}

pub(crate) fn decode_timer(value: Value) -> Option<Timer> {
    match value {
        Value::Object(_) => Some(Timer::from(value)),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
