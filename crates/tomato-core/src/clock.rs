//! Wall-clock and local-date source.
//!
//! Timers stamp instants as epoch milliseconds and statistics bucket by local
//! calendar date. Both go through a [`Clock`] so the coordinator can be driven
//! deterministically in tests with a [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, TimeZone, Utc};

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Local calendar date of an epoch-millisecond instant.
    fn local_date(&self, epoch_ms: u64) -> NaiveDate;

    fn today(&self) -> NaiveDate {
        self.local_date(self.now_ms())
    }
}

/// The host's clock and time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        now_ms()
    }

    fn local_date(&self, epoch_ms: u64) -> NaiveDate {
        to_utc(epoch_ms).with_timezone(&Local).date_naive()
    }
}

/// A clock that only moves when told to, in a fixed UTC offset.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicU64,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(epoch_ms: u64) -> Self {
        Self::with_offset(epoch_ms, utc_offset())
    }

    pub fn with_offset(epoch_ms: u64, offset: FixedOffset) -> Self {
        Self {
            now_ms: AtomicU64::new(epoch_ms),
            offset,
        }
    }

    /// Clock positioned at `hour:minute` on `date` in UTC.
    pub fn at(date: NaiveDate, hour: u32, minute: u32) -> Self {
        let ms = date
            .and_hms_opt(hour, minute, 0)
            .map(|dt| Utc.from_utc_datetime(&dt).timestamp_millis())
            .unwrap_or_default();
        Self::new(u64::try_from(ms).unwrap_or_default())
    }

    pub fn set_ms(&self, epoch_ms: u64) {
        self.now_ms.store(epoch_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.now_ms
            .fetch_add(secs.saturating_mul(1000), Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: u64) {
        self.advance_secs(days.saturating_mul(86_400));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn local_date(&self, epoch_ms: u64) -> NaiveDate {
        to_utc(epoch_ms).with_timezone(&self.offset).date_naive()
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Epoch milliseconds as a UTC timestamp (the epoch itself if out of range).
pub fn to_utc(epoch_ms: u64) -> DateTime<Utc> {
    i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default()
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}
