//! The day's interval sequence.
//!
//! A [`Day`] is generated ahead of time from [`ScheduleRules`] and then only
//! changes through [`edit_interval`], [`add_bonus_pomodoro`] and
//! [`remove_interval`], which return a new `Day` rather than mutating the
//! old one.

mod edit;
mod interval;
mod rules;

use chrono::{DateTime, Utc};

pub use edit::{add_bonus_pomodoro, edit_interval, remove_interval, IntervalBounds};
pub use interval::{Day, Interval, IntervalId, IntervalKind};
pub use rules::{generate, ScheduleRules};

/// The interval whose `[start, end)` contains `now`, if any.
pub fn current_interval(day: &Day, now: DateTime<Utc>) -> Option<&Interval> {
    day.intervals.iter().find(|i| i.contains(now))
}
