use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What an interval is for. Decides which settings field sizes a new timer
/// and whether its completion produces a session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    #[default]
    Pomodoro,
    #[serde(alias = "shortBreak")]
    ShortBreak,
    #[serde(alias = "longBreak")]
    LongBreak,
}

impl IntervalKind {
    pub const ALL: [IntervalKind; 3] = [
        IntervalKind::Pomodoro,
        IntervalKind::ShortBreak,
        IntervalKind::LongBreak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalKind::Pomodoro => "pomodoro",
            IntervalKind::ShortBreak => "short_break",
            IntervalKind::LongBreak => "long_break",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IntervalKind::Pomodoro => "Pomodoro",
            IntervalKind::ShortBreak => "Short Break",
            IntervalKind::LongBreak => "Long Break",
        }
    }

    /// Seconds a timer of this kind lasts under default settings.
    pub fn default_duration(&self) -> u32 {
        match self {
            IntervalKind::Pomodoro => 25 * 60,
            IntervalKind::ShortBreak => 5 * 60,
            IntervalKind::LongBreak => 15 * 60,
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, IntervalKind::Pomodoro)
    }

    /// Only focus intervals are recorded as sessions.
    pub fn records_session(&self) -> bool {
        matches!(self, IntervalKind::Pomodoro)
    }
}

impl fmt::Display for IntervalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pomodoro" | "focus" => Ok(IntervalKind::Pomodoro),
            "short_break" | "shortBreak" | "short-break" => Ok(IntervalKind::ShortBreak),
            "long_break" | "longBreak" | "long-break" => Ok(IntervalKind::LongBreak),
            other => Err(format!("unknown interval kind: {other}")),
        }
    }
}
