//! SQLite-backed key-value storage.
//!
//! One `kv` table holds the JSON documents. Calls run on the blocking pool so
//! the async coordinator never stalls on disk I/O.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    decode_state, encode_state, PersistedState, Storage, ALL_KEYS, SESSIONS_KEY,
    SETTINGS_KEY, STORAGE_VERSION, TIMER_KEY, VERSION_KEY,
};
use crate::error::{Result, StorageError};
use crate::session::SessionRecord;
use crate::settings::Settings;
use crate::timer::Timer;

#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and bring it to the current
    /// storage version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        Self::init(conn, Some(path))
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StorageError> {
        conn.execute_batch(
            "PRAGMA busy_timeout = 5000;
            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };
        {
            let mut conn = storage.lock();
            let current = stored_version(&conn)?;
            if current < STORAGE_VERSION {
                migrate(&mut conn, current, STORAGE_VERSION)?;
            } else if current > STORAGE_VERSION {
                tracing::warn!(
                    stored = current,
                    supported = STORAGE_VERSION,
                    "database written by a newer version; reading leniently"
                );
            }
        }
        Ok(storage)
    }

    /// Location of the database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The storage version recorded in the database (0 when never written).
    pub fn storage_version(&self) -> Result<u32, StorageError> {
        stored_version(&self.lock())
    }

    /// Get a raw document.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        kv_get(&self.lock(), key)
    }

    /// Set a raw document.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        kv_set(&self.lock(), key, value)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("storage task failed: {e}")))?
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn load_all(&self) -> Result<PersistedState, StorageError> {
        self.blocking(|conn| {
            let settings = kv_get(conn, SETTINGS_KEY)?;
            let sessions = kv_get(conn, SESSIONS_KEY)?;
            let timer = kv_get(conn, TIMER_KEY)?;
            Ok(decode_state(
                settings.as_deref(),
                sessions.as_deref(),
                timer.as_deref(),
            ))
        })
        .await
    }

    async fn save_all(
        &self,
        settings: &Settings,
        sessions: &[SessionRecord],
        timer: Option<&Timer>,
    ) -> Result<(), StorageError> {
        let encoded = encode_state(settings, sessions, timer)?;
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            kv_set(&tx, SETTINGS_KEY, &encoded.settings)?;
            kv_set(&tx, SESSIONS_KEY, &encoded.sessions)?;
            match &encoded.timer {
                Some(timer) => kv_set(&tx, TIMER_KEY, timer)?,
                None => kv_delete(&tx, TIMER_KEY)?,
            }
            kv_set(&tx, VERSION_KEY, &STORAGE_VERSION.to_string())?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        self.blocking(|conn| {
            let tx = conn.transaction()?;
            for key in ALL_KEYS {
                kv_delete(&tx, key)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn kv_get(conn: &Connection, key: &str) -> Result<Option<String>, StorageError> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(value)
}

fn kv_set(conn: &Connection, key: &str, value: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn kv_delete(conn: &Connection, key: &str) -> Result<(), StorageError> {
    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
    Ok(())
}

/// Unparseable version text reads as 0 so the migration path re-runs.
fn stored_version(conn: &Connection) -> Result<u32, StorageError> {
    Ok(kv_get(conn, VERSION_KEY)?
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .unwrap_or(0))
}

/// Bring stored documents from `from` to `to`, recording the new version.
fn migrate(conn: &mut Connection, from: u32, to: u32) -> Result<(), StorageError> {
    tracing::info!(from, to, "migrating storage");
    let fail = |e: StorageError| StorageError::MigrationFailed {
        from,
        to,
        message: e.to_string(),
    };
    let tx = conn.transaction().map_err(|e| fail(e.into()))?;
    if from < 1 {
        // Version 0 stores may hold sessions written before ids and dates
        // were mandatory; the lenient decoder fills them in, so rewriting
        // the array fixes the fields for good.
        if let Some(raw) = kv_get(&tx, SESSIONS_KEY).map_err(fail)? {
            if let Ok(value) = serde_json::from_str(&raw) {
                let sessions = super::decode_sessions(value);
                let rewritten = serde_json::to_string(&sessions).map_err(|source| {
                    fail(StorageError::Encode {
                        key: SESSIONS_KEY,
                        source,
                    })
                })?;
                kv_set(&tx, SESSIONS_KEY, &rewritten).map_err(fail)?;
            }
        }
    }
    kv_set(&tx, VERSION_KEY, &to.to_string()).map_err(fail)?;
    tx.commit().map_err(|e| fail(e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::IntervalKind;
    use chrono::NaiveDate;

    fn sample_session() -> SessionRecord {
        SessionRecord::new(
            IntervalKind::Pomodoro,
            1500,
            0,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        )
        .completed_at(1_500_000)
    }

    #[test]
    fn fresh_database_is_at_current_version() {
        let storage = SqliteStorage::open_memory().unwrap();
        assert_eq!(storage.storage_version().unwrap(), STORAGE_VERSION);
        assert!(storage.path().is_none());
    }

    #[test]
    fn kv_store() {
        let storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.kv_get("test").unwrap().is_none());
        storage.kv_set("test", "hello").unwrap();
        assert_eq!(storage.kv_get("test").unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn save_load_and_clear() {
        let storage = SqliteStorage::open_memory().unwrap();
        let mut settings = Settings::default();
        settings.update_language("en").unwrap();
        let sessions = vec![sample_session()];
        let timer = Timer::new(IntervalKind::Pomodoro, 1500);

        storage.save_all(&settings, &sessions, Some(&timer)).await.unwrap();
        let state = storage.load_all().await.unwrap();
        assert_eq!(state.settings, settings);
        assert_eq!(state.sessions, sessions);
        assert_eq!(state.timer, Some(timer));

        storage.clear_all().await.unwrap();
        assert_eq!(storage.load_all().await.unwrap(), PersistedState::default());
        assert!(storage.kv_get(VERSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn saving_without_timer_removes_it() {
        let storage = SqliteStorage::open_memory().unwrap();
        let timer = Timer::new(IntervalKind::LongBreak, 900);
        storage
            .save_all(&Settings::default(), &[], Some(&timer))
            .await
            .unwrap();
        storage.save_all(&Settings::default(), &[], None).await.unwrap();
        assert!(storage.load_all().await.unwrap().timer.is_none());
    }

    #[test]
    fn version_zero_store_is_migrated_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE kv (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
            )
            .unwrap();
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)",
                params![
                    SESSIONS_KEY,
                    r#"[{"duration":60,"completed":true,"startTime":0,"endTime":60000,"date":"2024-01-01"}]"#
                ],
            )
            .unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        assert_eq!(storage.storage_version().unwrap(), 1);
        let raw = storage.kv_get(SESSIONS_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value[0]["id"].as_str().unwrap().starts_with("session_"));
        assert_eq!(value[0]["actualDuration"], 60);
    }

    #[tokio::test]
    async fn reopening_file_keeps_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tomato.db");
        let sessions = vec![sample_session()];
        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage
                .save_all(&Settings::default(), &sessions, None)
                .await
                .unwrap();
        }
        let storage = SqliteStorage::open(&path).unwrap();
        assert_eq!(storage.load_all().await.unwrap().sessions, sessions);
    }
}
