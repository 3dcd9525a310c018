//! User preferences: interval lengths, language, alert toggles.
//!
//! Each mutator validates its own field and leaves the settings untouched on
//! rejection. Partial updates go through [`Settings::apply`], which applies
//! every individually valid field and reports the outcome per field.
//!
//! Persisted as JSON with camelCase keys:
//!
//! ```json
//! {
//!   "pomodoroLength": 1500, "shortBreakLength": 300, "longBreakLength": 900,
//!   "language": "ja",
//!   "notifications": { "enabled": true, "sound": true, "vibration": true },
//!   "autoStart": false, "version": 1
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::lenient::{self, Object};
use crate::timer::IntervalKind;

pub const SUPPORTED_LANGUAGES: [&str; 5] = ["ja", "en", "zh", "de", "es"];

pub const MAX_POMODORO_SECS: u32 = 60 * 60;
pub const MAX_SHORT_BREAK_SECS: u32 = 30 * 60;
pub const MAX_LONG_BREAK_SECS: u32 = 60 * 60;

/// Schema version written with every settings document.
pub const SETTINGS_VERSION: u32 = 1;

// Default functions
fn default_pomodoro_length() -> u32 {
    25 * 60
}
fn default_short_break_length() -> u32 {
    5 * 60
}
fn default_long_break_length() -> u32 {
    15 * 60
}
fn default_language() -> String {
    "ja".into()
}
fn default_true() -> bool {
    true
}

/// Completion-alert toggles, each gated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub sound: bool,
    #[serde(default = "default_true")]
    pub vibration: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
            vibration: true,
        }
    }
}

impl NotificationPrefs {
    fn merge(&mut self, patch: &NotificationPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(sound) = patch.sound {
            self.sound = sound;
        }
        if let Some(vibration) = patch.vibration {
            self.vibration = vibration;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct Settings {
    pomodoro_length: u32,
    short_break_length: u32,
    long_break_length: u32,
    language: String,
    notifications: NotificationPrefs,
    auto_start: bool,
    version: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pomodoro_length: default_pomodoro_length(),
            short_break_length: default_short_break_length(),
            long_break_length: default_long_break_length(),
            language: default_language(),
            notifications: NotificationPrefs::default(),
            auto_start: false,
            version: SETTINGS_VERSION,
        }
    }
}

impl Settings {
    pub fn pomodoro_length(&self) -> u32 {
        self.pomodoro_length
    }

    pub fn short_break_length(&self) -> u32 {
        self.short_break_length
    }

    pub fn long_break_length(&self) -> u32 {
        self.long_break_length
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn notifications(&self) -> NotificationPrefs {
        self.notifications
    }

    pub fn auto_start(&self) -> bool {
        self.auto_start
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Length in seconds of a new timer of `kind`.
    pub fn duration_for(&self, kind: IntervalKind) -> u32 {
        match kind {
            IntervalKind::Pomodoro => self.pomodoro_length,
            IntervalKind::ShortBreak => self.short_break_length,
            IntervalKind::LongBreak => self.long_break_length,
        }
    }

    pub fn update_pomodoro_length(&mut self, secs: i64) -> Result<(), ValidationError> {
        self.pomodoro_length = checked_length("pomodoroLength", secs, MAX_POMODORO_SECS)?;
        Ok(())
    }

    pub fn update_short_break_length(&mut self, secs: i64) -> Result<(), ValidationError> {
        self.short_break_length = checked_length("shortBreakLength", secs, MAX_SHORT_BREAK_SECS)?;
        Ok(())
    }

    pub fn update_long_break_length(&mut self, secs: i64) -> Result<(), ValidationError> {
        self.long_break_length = checked_length("longBreakLength", secs, MAX_LONG_BREAK_SECS)?;
        Ok(())
    }

    pub fn update_language(&mut self, language: &str) -> Result<(), ValidationError> {
        if !SUPPORTED_LANGUAGES.contains(&language) {
            return Err(ValidationError::UnsupportedLanguage(language.to_string()));
        }
        self.language = language.to_string();
        Ok(())
    }

    /// Merge the given sub-flags; absent flags keep their value.
    pub fn update_notifications(&mut self, patch: &NotificationPatch) {
        self.notifications.merge(patch);
    }

    pub fn update_auto_start(&mut self, auto_start: bool) {
        self.auto_start = auto_start;
    }

    /// Restore every field to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Lenient merge: apply each valid field of `patch`, keep the prior value
    /// of each rejected one, and say which was which.
    pub fn apply(&mut self, patch: &SettingsPatch) -> SettingsUpdateReport {
        let mut report = SettingsUpdateReport::default();

        if let Some(secs) = patch.pomodoro_length {
            report.record("pomodoroLength", self.update_pomodoro_length(secs));
        }
        if let Some(secs) = patch.short_break_length {
            report.record("shortBreakLength", self.update_short_break_length(secs));
        }
        if let Some(secs) = patch.long_break_length {
            report.record("longBreakLength", self.update_long_break_length(secs));
        }
        if let Some(language) = &patch.language {
            report.record("language", self.update_language(language));
        }
        if let Some(notifications) = &patch.notifications {
            self.update_notifications(notifications);
            report.record("notifications", Ok(()));
        }
        if let Some(auto_start) = patch.auto_start {
            self.update_auto_start(auto_start);
            report.record("autoStart", Ok(()));
        }
        for (field, message) in &patch.invalid {
            report.results.push(FieldResult {
                field: field.clone(),
                outcome: FieldOutcome::Rejected(ValidationError::InvalidValue {
                    field: field.clone(),
                    message: message.clone(),
                }),
            });
        }
        for field in &patch.unknown {
            report.results.push(FieldResult {
                field: field.clone(),
                outcome: FieldOutcome::Ignored,
            });
        }
        report
    }
}

fn checked_length(field: &'static str, secs: i64, max: u32) -> Result<u32, ValidationError> {
    match u32::try_from(secs) {
        Ok(value) if value > 0 && value <= max => Ok(value),
        _ => Err(ValidationError::OutOfRange {
            field,
            value: secs,
            max,
        }),
    }
}

/// Per-field fallback to defaults: a document that is partial, mistyped or
/// out of range still yields usable settings.
impl From<Value> for Settings {
    fn from(value: Value) -> Self {
        let obj = lenient::object(&value);
        let defaults = Settings::default();
        let length = |key: &str, max: u32, fallback: u32| {
            lenient::positive_u32(obj, key)
                .filter(|v| *v <= max)
                .unwrap_or(fallback)
        };
        let notifications_obj = obj.get("notifications").map(lenient::object);
        let flag = |key: &str| {
            notifications_obj
                .and_then(|n| lenient::bool_field(n, key))
                .unwrap_or(true)
        };

        Settings {
            pomodoro_length: length("pomodoroLength", MAX_POMODORO_SECS, defaults.pomodoro_length),
            short_break_length: length(
                "shortBreakLength",
                MAX_SHORT_BREAK_SECS,
                defaults.short_break_length,
            ),
            long_break_length: length(
                "longBreakLength",
                MAX_LONG_BREAK_SECS,
                defaults.long_break_length,
            ),
            language: lenient::str_field(obj, "language")
                .filter(|lang| SUPPORTED_LANGUAGES.contains(lang))
                .map(str::to_string)
                .unwrap_or(defaults.language),
            notifications: NotificationPrefs {
                enabled: flag("enabled"),
                sound: flag("sound"),
                vibration: flag("vibration"),
            },
            auto_start: lenient::bool_field(obj, "autoStart").unwrap_or(defaults.auto_start),
            version: lenient::positive_u32(obj, "version").unwrap_or(SETTINGS_VERSION),
        }
    }
}

// ── Partial updates ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPatch {
    pub enabled: Option<bool>,
    pub sound: Option<bool>,
    pub vibration: Option<bool>,
}

/// A partial settings update. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub pomodoro_length: Option<i64>,
    pub short_break_length: Option<i64>,
    pub long_break_length: Option<i64>,
    pub language: Option<String>,
    pub notifications: Option<NotificationPatch>,
    pub auto_start: Option<bool>,
    /// Known fields whose JSON value had the wrong type, with a reason.
    invalid: Vec<(String, String)>,
    /// Keys that are not settings fields.
    unknown: Vec<String>,
}

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pomodoro_length(mut self, secs: i64) -> Self {
        self.pomodoro_length = Some(secs);
        self
    }

    pub fn short_break_length(mut self, secs: i64) -> Self {
        self.short_break_length = Some(secs);
        self
    }

    pub fn long_break_length(mut self, secs: i64) -> Self {
        self.long_break_length = Some(secs);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn notifications(mut self, patch: NotificationPatch) -> Self {
        self.notifications = Some(patch);
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = Some(auto_start);
        self
    }

    /// Build a patch from a loosely typed JSON object, the shape a UI sends.
    /// Wrong-typed known fields and unknown keys are carried along so that
    /// [`Settings::apply`] can report them.
    pub fn from_json(value: &Value) -> Self {
        let obj: &Object = lenient::object(value);
        let mut patch = SettingsPatch::default();
        for (key, field) in obj {
            match key.as_str() {
                "pomodoroLength" => patch.pomodoro_length = patch.integer(key, field),
                "shortBreakLength" => patch.short_break_length = patch.integer(key, field),
                "longBreakLength" => patch.long_break_length = patch.integer(key, field),
                "language" => match field.as_str() {
                    Some(lang) => patch.language = Some(lang.to_string()),
                    None => patch.reject(key, "expected a string"),
                },
                "notifications" => match field {
                    Value::Object(flags) => {
                        patch.notifications = Some(NotificationPatch {
                            enabled: lenient::bool_field(flags, "enabled"),
                            sound: lenient::bool_field(flags, "sound"),
                            vibration: lenient::bool_field(flags, "vibration"),
                        })
                    }
                    _ => patch.reject(key, "expected an object"),
                },
                "autoStart" => match field.as_bool() {
                    Some(flag) => patch.auto_start = Some(flag),
                    None => patch.reject(key, "expected a boolean"),
                },
                _ => patch.unknown.push(key.clone()),
            }
        }
        patch
    }

    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }

    fn integer(&mut self, key: &str, field: &Value) -> Option<i64> {
        let parsed = lenient::as_i64(field);
        if parsed.is_none() {
            self.reject(key, "expected an integer number of seconds");
        }
        parsed
    }

    fn reject(&mut self, key: &str, message: &str) {
        self.invalid.push((key.to_string(), message.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Applied,
    Rejected(ValidationError),
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldResult {
    pub field: String,
    pub outcome: FieldOutcome,
}

/// Per-field diagnostics of a lenient merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdateReport {
    pub results: Vec<FieldResult>,
}

impl SettingsUpdateReport {
    fn record(&mut self, field: &str, result: Result<(), ValidationError>) {
        let outcome = match result {
            Ok(()) => FieldOutcome::Applied,
            Err(err) => FieldOutcome::Rejected(err),
        };
        self.results.push(FieldResult {
            field: field.to_string(),
            outcome,
        });
    }

    pub fn applied(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.outcome == FieldOutcome::Applied)
            .map(|r| r.field.as_str())
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&str, &ValidationError)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            FieldOutcome::Rejected(err) => Some((r.field.as_str(), err)),
            _ => None,
        })
    }

    pub fn ignored(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.outcome == FieldOutcome::Ignored)
            .map(|r| r.field.as_str())
    }

    pub fn any_applied(&self) -> bool {
        self.applied().next().is_some()
    }

    /// True when nothing was rejected or ignored.
    pub fn is_clean(&self) -> bool {
        self.results.iter().all(|r| r.outcome == FieldOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_values() {
        let s = Settings::default();
        assert_eq!(s.pomodoro_length(), 1500);
        assert_eq!(s.short_break_length(), 300);
        assert_eq!(s.long_break_length(), 900);
        assert_eq!(s.language(), "ja");
        assert_eq!(s.notifications(), NotificationPrefs::default());
        assert!(!s.auto_start());
        assert_eq!(s.version(), 1);
    }

    #[test]
    fn pomodoro_length_bounds() {
        let mut s = Settings::default();
        assert!(s.update_pomodoro_length(3600).is_ok());
        assert_eq!(s.pomodoro_length(), 3600);
        assert!(s.update_pomodoro_length(1).is_ok());
        assert_eq!(s.pomodoro_length(), 1);

        for bad in [0, -1, 3601, i64::MAX] {
            assert!(s.update_pomodoro_length(bad).is_err());
            assert_eq!(s.pomodoro_length(), 1);
        }
    }

    #[test]
    fn short_break_caps_at_thirty_minutes() {
        let mut s = Settings::default();
        assert!(s.update_short_break_length(1800).is_ok());
        let err = s.update_short_break_length(1801).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRange {
                field: "shortBreakLength",
                value: 1801,
                max: 1800
            }
        );
        assert_eq!(s.short_break_length(), 1800);
    }

    #[test]
    fn long_break_caps_at_sixty_minutes() {
        let mut s = Settings::default();
        assert!(s.update_long_break_length(3600).is_ok());
        assert!(s.update_long_break_length(3601).is_err());
        assert_eq!(s.long_break_length(), 3600);
    }

    #[test]
    fn language_must_be_supported() {
        let mut s = Settings::default();
        assert!(s.update_language("en").is_ok());
        assert!(s.update_language("fr").is_err());
        assert_eq!(s.language(), "en");
    }

    #[test]
    fn notifications_merge_sub_flags() {
        let mut s = Settings::default();
        s.update_notifications(&NotificationPatch {
            sound: Some(false),
            ..Default::default()
        });
        let prefs = s.notifications();
        assert!(prefs.enabled);
        assert!(!prefs.sound);
        assert!(prefs.vibration);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut s = Settings::default();
        s.update_pomodoro_length(60).unwrap();
        s.update_auto_start(true);
        s.reset();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn duration_for_each_kind() {
        let s = Settings::default();
        assert_eq!(s.duration_for(IntervalKind::Pomodoro), 1500);
        assert_eq!(s.duration_for(IntervalKind::ShortBreak), 300);
        assert_eq!(s.duration_for(IntervalKind::LongBreak), 900);
    }

    #[test]
    fn apply_keeps_valid_fields_and_reports_rejections() {
        let mut s = Settings::default();
        let patch = SettingsPatch::new()
            .pomodoro_length(0)
            .short_break_length(600)
            .language("xx")
            .auto_start(true);
        let report = s.apply(&patch);

        assert_eq!(s.pomodoro_length(), 1500);
        assert_eq!(s.short_break_length(), 600);
        assert_eq!(s.language(), "ja");
        assert!(s.auto_start());

        let applied: Vec<_> = report.applied().collect();
        assert_eq!(applied, vec!["shortBreakLength", "autoStart"]);
        let rejected: Vec<_> = report.rejected().map(|(f, _)| f).collect();
        assert_eq!(rejected, vec!["pomodoroLength", "language"]);
        assert!(!report.is_clean());
        assert!(report.any_applied());
    }

    #[test]
    fn patch_from_json_tracks_unknown_and_mistyped_fields() {
        let patch = SettingsPatch::from_json(&json!({
            "pomodoroLength": 1200,
            "longBreakLength": "long",
            "theme": "dark",
            "notifications": {"vibration": false}
        }));
        assert_eq!(patch.pomodoro_length, Some(1200));
        assert_eq!(patch.long_break_length, None);

        let mut s = Settings::default();
        let report = s.apply(&patch);
        assert_eq!(s.pomodoro_length(), 1200);
        assert!(!s.notifications().vibration);
        assert_eq!(report.ignored().collect::<Vec<_>>(), vec!["theme"]);
        assert_eq!(
            report.rejected().map(|(f, _)| f).collect::<Vec<_>>(),
            vec!["longBreakLength"]
        );
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut s = Settings::default();
        let report = s.apply(&SettingsPatch::new());
        assert!(report.results.is_empty());
        assert!(SettingsPatch::new().is_empty());
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn persisted_form_roundtrip() {
        let mut s = Settings::default();
        s.update_pomodoro_length(1800).unwrap();
        s.update_language("de").unwrap();
        s.update_auto_start(true);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["pomodoroLength"], 1800);
        assert_eq!(json["notifications"]["sound"], true);
        let back: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn partial_and_invalid_documents_fall_back_per_field() {
        let s: Settings = serde_json::from_value(json!({
            "pomodoroLength": 1200,
            "shortBreakLength": 99999,
            "longBreakLength": "fifteen",
            "language": "klingon",
            "notifications": {"sound": false},
            "autoStart": "yes"
        }))
        .unwrap();
        assert_eq!(s.pomodoro_length(), 1200);
        assert_eq!(s.short_break_length(), 300);
        assert_eq!(s.long_break_length(), 900);
        assert_eq!(s.language(), "ja");
        assert!(s.notifications().enabled);
        assert!(!s.notifications().sound);
        assert!(!s.auto_start());

        let from_null: Settings = serde_json::from_value(Value::Null).unwrap();
        assert_eq!(from_null, Settings::default());
    }
}
