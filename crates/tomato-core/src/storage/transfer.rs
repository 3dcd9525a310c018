//! Export/import bundles.
//!
//! An export is a single JSON document:
//!
//! ```json
//! { "settings": {..}, "sessions": [..], "timer": {..} | null,
//!   "exportedAt": "2024-05-01T09:00:00Z", "version": 1 }
//! ```
//!
//! Import accepts any object with a valid `version`; each of the three parts
//! is optional and only present parts replace current data.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::ImportError;
use crate::lenient;
use crate::session::SessionRecord;
use crate::settings::Settings;
use crate::timer::Timer;

/// Newest bundle version this build reads and the one it writes.
pub const BUNDLE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub settings: Settings,
    pub sessions: Vec<SessionRecord>,
    pub timer: Option<Timer>,
    pub exported_at: DateTime<Utc>,
    pub version: u32,
}

impl ExportBundle {
    pub fn new(
        settings: Settings,
        sessions: Vec<SessionRecord>,
        timer: Option<Timer>,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            settings,
            sessions,
            timer,
            exported_at,
            version: BUNDLE_VERSION,
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// A validated import. `None` parts leave the current data untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportBundle {
    pub settings: Option<Settings>,
    pub sessions: Option<Vec<SessionRecord>>,
    pub timer: Option<Timer>,
    pub version: u32,
}

impl ImportBundle {
    pub fn from_json_str(raw: &str) -> Result<Self, ImportError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ImportError::InvalidFormat(e.to_string()))?;
        Self::parse(&value)
    }

    /// Validate the bundle envelope and decode its parts leniently.
    pub fn parse(value: &Value) -> Result<Self, ImportError> {
        let Value::Object(obj) = value else {
            return Err(ImportError::InvalidFormat("expected a JSON object".into()));
        };

        let version = obj
            .get("version")
            .and_then(lenient::as_i64)
            .ok_or(ImportError::MissingVersion)?;
        let version = match u32::try_from(version) {
            Ok(v) if (1..=BUNDLE_VERSION).contains(&v) => v,
            _ => {
                return Err(ImportError::UnsupportedVersion {
                    found: version,
                    supported: BUNDLE_VERSION,
                })
            }
        };

        let settings = match obj.get("settings") {
            Some(doc @ Value::Object(_)) => Some(Settings::from(doc.clone())),
            _ => None,
        };
        let sessions = match obj.get("sessions") {
            Some(list @ Value::Array(_)) => Some(super::decode_sessions(list.clone())),
            _ => None,
        };
        let timer = obj.get("timer").cloned().and_then(super::decode_timer);

        Ok(Self {
            settings,
            sessions,
            timer,
            version,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_none() && self.sessions.is_none() && self.timer.is_none()
    }
}
