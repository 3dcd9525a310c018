//! Completed-interval history entries.
//!
//! A record is created when a pomodoro timer finishes (or decoded from
//! persisted/imported data) and is frozen after its one-time `complete()`.
//! The calendar `date` is fixed at creation so statistics stay anchored to
//! the day the record was made, even when completion lands after midnight.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::clock::now_ms;
use crate::lenient;
use crate::timer::{format_mm_ss, IntervalKind};

/// Schema version written with every session record.
pub const SESSION_VERSION: u32 = 1;

const DEFAULT_DURATION_SECS: u32 = 25 * 60;
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct SessionRecord {
    id: String,
    start_time: u64,
    end_time: Option<u64>,
    /// Scheduled length in seconds.
    duration: u32,
    /// Measured length in seconds; present iff `completed`.
    actual_duration: Option<u32>,
    #[serde(rename = "type")]
    kind: IntervalKind,
    completed: bool,
    /// `YYYY-MM-DD`, local to creation time. Kept as text so that a
    /// malformed persisted date survives a load/save cycle untouched.
    date: String,
    version: u32,
}

impl SessionRecord {
    /// An in-progress record started at `start_time` (epoch ms).
    pub fn new(kind: IntervalKind, duration_secs: u32, start_time: u64, date: NaiveDate) -> Self {
        Self {
            id: format!("session_{}", Uuid::new_v4().simple()),
            start_time,
            end_time: None,
            duration: duration_secs,
            actual_duration: None,
            kind,
            completed: false,
            date: date.format(DATE_FORMAT).to_string(),
            version: SESSION_VERSION,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn end_time(&self) -> Option<u64> {
        self.end_time
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn actual_duration(&self) -> Option<u32> {
        self.actual_duration
    }

    pub fn kind(&self) -> IntervalKind {
        self.kind
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// The raw `YYYY-MM-DD` text as stored.
    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Parsed calendar date, `None` when the stored text is malformed.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT).ok()
    }

    /// Seconds counted toward statistics: the measured duration when known,
    /// the scheduled one otherwise.
    pub fn effective_duration(&self) -> u32 {
        self.actual_duration.unwrap_or(self.duration)
    }

    /// `effective_duration` as `MM:SS`.
    pub fn formatted_duration(&self) -> String {
        format_mm_ss(self.effective_duration())
    }

    pub fn complete(&mut self) -> bool {
        self.complete_at(now_ms())
    }

    /// One-time transition to completed. Returns `false` (and changes
    /// nothing) when the record is already completed.
    pub fn complete_at(&mut self, end_time: u64) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.end_time = Some(end_time);
        self.actual_duration = Some(elapsed_secs(self.start_time, end_time));
        true
    }

    /// Builder-style `complete_at` for freshly created records.
    pub fn completed_at(mut self, end_time: u64) -> Self {
        self.complete_at(end_time);
        self
    }
}

/// Lenient reconstruction from persisted or imported data.
///
/// Missing or invalid fields take defaults; a missing `date` stays empty
/// rather than guessing a day. The `actual_duration` invariant
/// is re-established: dropped on incomplete records, derived on completed
/// records that lack it.
impl From<Value> for SessionRecord {
    fn from(value: Value) -> Self {
        let obj = lenient::object(&value);
        let kind = lenient::typed_field(obj, "type").unwrap_or_default();
        let duration = lenient::positive_u32(obj, "duration").unwrap_or(DEFAULT_DURATION_SECS);
        let start_time = lenient::u64_field(obj, "startTime").unwrap_or_else(now_ms);
        let mut record = SessionRecord::new(kind, duration, start_time, NaiveDate::default());
        if let Some(id) = lenient::str_field(obj, "id") {
            record.id = id.to_string();
        }
        // An undated record stays undated: statistics count it in the
        // all-time totals only.
        record.date = lenient::str_field(obj, "date").unwrap_or_default().to_string();
        record.version = lenient::positive_u32(obj, "version").unwrap_or(SESSION_VERSION);
        record.end_time = lenient::u64_field(obj, "endTime");
        record.completed = lenient::bool_field(obj, "completed").unwrap_or(false);
        record.actual_duration = if record.completed {
            lenient::u64_field(obj, "actualDuration")
                .and_then(|d| u32::try_from(d).ok())
                .or_else(|| record.end_time.map(|end| elapsed_secs(start_time, end)))
                .or(Some(duration))
        } else {
            None
        };
        record
    }
}

fn elapsed_secs(start: u64, end: u64) -> u32 {
    u32::try_from(end.saturating_sub(start) / 1000).unwrap_or(u32::MAX)
}
