//! Countdown timer state machine.
//!
//! The timer does not use internal threads or read the wall clock on its own
//! for the countdown: each `tick()` removes exactly one second, and the caller
//! (the coordinator's tick driver) is responsible for calling it once per
//! second while the timer is running.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//! Running -> Completed
//! (any) -> Idle   via reset()
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = Timer::new(IntervalKind::Pomodoro, 25 * 60);
//! timer.start();
//! // Once per second:
//! if let Some(Event::TimerCompleted { .. }) = timer.tick() { /* record */ }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::kind::IntervalKind;
use crate::clock::{now_ms, to_utc};
use crate::events::Event;
use crate::lenient;

/// Schema version written with every persisted timer.
pub const TIMER_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Completed => "completed",
        }
    }
}

/// The single active countdown.
///
/// Invariants: `remaining == duration` while idle, `remaining == 0` exactly
/// when completed, and `remaining` only decreases while running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct Timer {
    id: String,
    #[serde(rename = "type")]
    kind: IntervalKind,
    /// Total length in seconds.
    duration: u32,
    /// Seconds left in the countdown.
    remaining_time: u32,
    status: TimerStatus,
    /// Epoch ms of the most recent `start()`, including resumes.
    start_time: Option<u64>,
    completed_at: Option<u64>,
    version: u32,
}

impl Timer {
    /// Create an idle timer with the full duration remaining.
    pub fn new(kind: IntervalKind, duration_secs: u32) -> Self {
        Self {
            id: format!("timer_{}", Uuid::new_v4().simple()),
            kind,
            duration: duration_secs,
            remaining_time: duration_secs,
            status: TimerStatus::Idle,
            start_time: None,
            completed_at: None,
            version: TIMER_VERSION,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> IntervalKind {
        self.kind
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn remaining(&self) -> u32 {
        self.remaining_time
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    pub fn completed_at(&self) -> Option<u64> {
        self.completed_at
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// 0.0 .. 100.0 elapsed share of the duration. A zero-length timer
    /// reports 0.
    pub fn progress(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        let elapsed = self.duration.saturating_sub(self.remaining_time) as f64;
        elapsed / self.duration as f64 * 100.0
    }

    /// Remaining time as `MM:SS`.
    pub fn formatted_remaining(&self) -> String {
        format_mm_ss(self.remaining_time)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        self.start_at(now_ms())
    }

    /// Valid from idle or paused. Stamps the start instant on every call,
    /// resumes included.
    pub fn start_at(&mut self, now: u64) -> Option<Event> {
        let resuming = match self.status {
            TimerStatus::Idle => false,
            TimerStatus::Paused => true,
            TimerStatus::Running | TimerStatus::Completed => return None,
        };
        self.status = TimerStatus::Running;
        self.start_time = Some(now);
        if resuming {
            Some(Event::TimerResumed {
                timer_id: self.id.clone(),
                remaining_secs: self.remaining_time,
                at: to_utc(now),
            })
        } else {
            Some(Event::TimerStarted {
                timer_id: self.id.clone(),
                kind: self.kind,
                duration_secs: self.duration,
                at: to_utc(now),
            })
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        self.pause_at(now_ms())
    }

    pub fn pause_at(&mut self, now: u64) -> Option<Event> {
        if self.status != TimerStatus::Running {
            return None;
        }
        self.status = TimerStatus::Paused;
        Some(Event::TimerPaused {
            timer_id: self.id.clone(),
            remaining_secs: self.remaining_time,
            at: to_utc(now),
        })
    }

    pub fn reset(&mut self) -> Option<Event> {
        self.reset_at(now_ms())
    }

    /// Back to idle with the full duration remaining. Always succeeds.
    pub fn reset_at(&mut self, now: u64) -> Option<Event> {
        self.remaining_time = self.duration;
        self.status = TimerStatus::Idle;
        self.start_time = None;
        self.completed_at = None;
        Some(Event::TimerReset {
            timer_id: self.id.clone(),
            at: to_utc(now),
        })
    }

    pub fn tick(&mut self) -> Option<Event> {
        self.tick_at(now_ms())
    }

    /// Remove one second. Returns `Some(Event::TimerCompleted)` on the tick
    /// that reaches zero and `None` on every other call.
    pub fn tick_at(&mut self, now: u64) -> Option<Event> {
        if self.status != TimerStatus::Running {
            return None;
        }
        // A running timer at zero completes on this tick.
        self.remaining_time = self.remaining_time.saturating_sub(1);
        if self.remaining_time == 0 {
            return self.complete_at(now);
        }
        None
    }

    pub fn complete(&mut self) -> Option<Event> {
        self.complete_at(now_ms())
    }

    /// Force the timer into `Completed` from any state.
    pub fn complete_at(&mut self, now: u64) -> Option<Event> {
        self.status = TimerStatus::Completed;
        self.remaining_time = 0;
        self.completed_at = Some(now);
        Some(Event::TimerCompleted {
            timer_id: self.id.clone(),
            kind: self.kind,
            at: to_utc(now),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Restore the state invariants on a decoded timer.
    fn normalize(mut self) -> Self {
        self.remaining_time = self.remaining_time.min(self.duration);
        match self.status {
            TimerStatus::Idle => {
                self.remaining_time = self.duration;
                self.start_time = None;
                self.completed_at = None;
            }
            TimerStatus::Completed => self.remaining_time = 0,
            TimerStatus::Running | TimerStatus::Paused => {
                if self.remaining_time == 0 {
                    self.status = TimerStatus::Completed;
                }
            }
        }
        self
    }
}

/// Lenient reconstruction from a persisted document: unknown or invalid
/// fields fall back to defaults, then the invariants are re-established.
impl From<Value> for Timer {
    fn from(value: Value) -> Self {
        let obj = lenient::object(&value);
        let kind: IntervalKind = lenient::typed_field(obj, "type").unwrap_or_default();
        let duration =
            lenient::positive_u32(obj, "duration").unwrap_or_else(|| kind.default_duration());
        let mut timer = Timer::new(kind, duration);
        if let Some(id) = lenient::str_field(obj, "id") {
            timer.id = id.to_string();
        }
        timer.remaining_time = lenient::u64_field(obj, "remainingTime")
            .and_then(|r| u32::try_from(r).ok())
            .unwrap_or(duration);
        timer.status = lenient::typed_field(obj, "status").unwrap_or_default();
        timer.start_time = lenient::u64_field(obj, "startTime");
        timer.completed_at = lenient::u64_field(obj, "completedAt");
        timer.version = lenient::positive_u32(obj, "version").unwrap_or(TIMER_VERSION);
        timer.normalize()
    }
}

pub(crate) fn format_mm_ss(total_secs: u32) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
