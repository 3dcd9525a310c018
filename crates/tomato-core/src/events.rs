use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{IntervalKind, TimerStatus};

/// Every state change in the system produces an Event.
/// Timer transitions return them; the coordinator broadcasts them so a UI
/// can re-read state without polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerCreated {
        timer_id: String,
        kind: IntervalKind,
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    TimerStarted {
        timer_id: String,
        kind: IntervalKind,
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    TimerResumed {
        timer_id: String,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerPaused {
        timer_id: String,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerTicked {
        timer_id: String,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerCompleted {
        timer_id: String,
        kind: IntervalKind,
        at: DateTime<Utc>,
    },
    TimerReset {
        timer_id: String,
        at: DateTime<Utc>,
    },
    /// The current timer was discarded.
    TimerStopped {
        timer_id: Option<String>,
        at: DateTime<Utc>,
    },
    SessionRecorded {
        session_id: String,
        kind: IntervalKind,
        actual_duration_secs: Option<u32>,
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        at: DateTime<Utc>,
    },
    DataLoaded {
        sessions: usize,
        has_timer: bool,
        at: DateTime<Utc>,
    },
    DataSaved {
        at: DateTime<Utc>,
    },
    DataCleared {
        at: DateTime<Utc>,
    },
    ErrorChanged {
        message: Option<String>,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        timer_id: Option<String>,
        status: Option<TimerStatus>,
        kind: Option<IntervalKind>,
        remaining_secs: u32,
        duration_secs: u32,
        progress_pct: f64,
        ticking: bool,
        is_loading: bool,
        error: Option<String>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Wire name of the variant, as used in the `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Event::TimerCreated { .. } => "timer_created",
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerResumed { .. } => "timer_resumed",
            Event::TimerPaused { .. } => "timer_paused",
            Event::TimerTicked { .. } => "timer_ticked",
            Event::TimerCompleted { .. } => "timer_completed",
            Event::TimerReset { .. } => "timer_reset",
            Event::TimerStopped { .. } => "timer_stopped",
            Event::SessionRecorded { .. } => "session_recorded",
            Event::SettingsUpdated { .. } => "settings_updated",
            Event::DataLoaded { .. } => "data_loaded",
            Event::DataSaved { .. } => "data_saved",
            Event::DataCleared { .. } => "data_cleared",
            Event::ErrorChanged { .. } => "error_changed",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}
