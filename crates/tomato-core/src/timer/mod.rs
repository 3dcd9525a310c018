mod engine;
mod kind;

pub use engine::{Timer, TimerStatus, TIMER_VERSION};
pub use kind::IntervalKind;

pub(crate) use engine::format_mm_ss;
