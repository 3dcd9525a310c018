use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{
    decode_state, encode_state, PersistedState, Storage, ALL_KEYS, SESSIONS_KEY, SETTINGS_KEY,
    STORAGE_VERSION, TIMER_KEY, VERSION_KEY,
};
use crate::error::{Result, StorageError};
use crate::session::SessionRecord;
use crate::settings::Settings;
use crate::timer::Timer;

/// Process-local storage holding the same JSON documents as the SQLite
/// backend. Used by tests and by hosts that opt out of persistence.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    docs: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw document, e.g. to exercise lenient loading.
    pub fn with_raw(self, key: &str, value: &str) -> Self {
        self.lock().insert(key.to_string(), value.to_string());
        self
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load_all(&self) -> Result<PersistedState, StorageError> {
        let docs = self.lock();
        Ok(decode_state(
            docs.get(SETTINGS_KEY).map(String::as_str),
            docs.get(SESSIONS_KEY).map(String::as_str),
            docs.get(TIMER_KEY).map(String::as_str),
        ))
    }

    async fn save_all(
        &self,
        settings: &Settings,
        sessions: &[SessionRecord],
        timer: Option<&Timer>,
    ) -> Result<(), StorageError> {
        let encoded = encode_state(settings, sessions, timer)?;
        let mut docs = self.lock();
        docs.insert(SETTINGS_KEY.to_string(), encoded.settings);
        docs.insert(SESSIONS_KEY.to_string(), encoded.sessions);
        match encoded.timer {
            Some(timer) => docs.insert(TIMER_KEY.to_string(), timer),
            None => docs.remove(TIMER_KEY),
        };
        docs.insert(VERSION_KEY.to_string(), STORAGE_VERSION.to_string());
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        let mut docs = self.lock();
        for key in ALL_KEYS {
            docs.remove(key);
        }
        Ok(())
    }
}
