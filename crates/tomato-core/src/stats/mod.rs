//! Statistics over the session history.
//!
//! Everything here is a pure function of the session list, the local
//! `today` and the week start. Only completed sessions count; durations are
//! `actualDuration` when present, the scheduled `duration` otherwise.

mod calendar;
mod streak;

pub use calendar::WeekStart;
pub use streak::{best_streak, current_streak};

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::session::SessionRecord;

/// Count and summed seconds of one date bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub count: u32,
    pub total_time: u64,
}

impl PeriodTotals {
    fn add(&mut self, secs: u32) {
        self.count += 1;
        self.total_time += u64::from(secs);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllTimeTotals {
    pub count: u32,
    pub total_time: u64,
    /// Mean seconds per completed session, 0 without sessions.
    pub average_time: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub today: PeriodTotals,
    pub this_week: PeriodTotals,
    pub this_month: PeriodTotals,
    pub total: AllTimeTotals,
    pub streak: u32,
    pub best_streak: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsEngine {
    week_start: WeekStart,
}

impl StatisticsEngine {
    pub fn new(week_start: WeekStart) -> Self {
        Self { week_start }
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    /// Aggregate `sessions` relative to `today`.
    ///
    /// Records whose date text does not parse still count toward the
    /// all-time totals but fall outside every date bucket and streak.
    pub fn compute(&self, sessions: &[SessionRecord], today: NaiveDate) -> Statistics {
        let mut stats = Statistics::default();
        let mut active_days = BTreeSet::new();

        for session in sessions.iter().filter(|s| s.is_completed()) {
            let secs = session.effective_duration();
            stats.total.count += 1;
            stats.total.total_time += u64::from(secs);

            let Some(date) = session.calendar_date() else {
                continue;
            };
            active_days.insert(date);
            if date == today {
                stats.today.add(secs);
            }
            if self.week_start.in_week_to_date(date, today) {
                stats.this_week.add(secs);
            }
            if calendar::same_month(date, today) {
                stats.this_month.add(secs);
            }
        }

        if stats.total.count > 0 {
            stats.total.average_time = stats.total.total_time as f64 / f64::from(stats.total.count);
        }
        stats.streak = current_streak(&active_days, today);
        stats.best_streak = best_streak(&active_days);
        stats
    }
}
