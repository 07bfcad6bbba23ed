//! The live view of "what is happening now".
//!
//! Unlike a stopwatch-style timer there is no stored state here: every
//! [`SessionView`] is re-derived from the day and the clock reading, so it
//! cannot disagree with the schedule.
//!
//! ```text
//! BeforeDay -> InFocusInterval <-> InBreakInterval -> AfterDay
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::intention::IntentionTracker;
use crate::schedule::{current_interval, Day, Interval, IntervalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    BeforeDay,
    InFocusInterval,
    InBreakInterval,
    AfterDay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub state: SessionState,
    /// The running interval, or in a gap / after the day the one that most
    /// recently ended.
    pub interval: Option<Interval>,
    /// Elapsed share of `interval`, clamped to `[0, 1]`.
    pub progress_fraction: f64,
    /// `interval` is past its end.
    pub overdue: bool,
    /// Focus interval without an intention, still inside the prompt window.
    pub in_grace: bool,
}

/// Raw elapsed share of an interval; may exceed 1.0 or be negative.
pub fn raw_progress(interval: &Interval, now: DateTime<Utc>) -> f64 {
    let total = interval.duration().num_milliseconds();
    if total <= 0 {
        return 1.0;
    }
    let elapsed = (now - interval.start).num_milliseconds();
    elapsed as f64 / total as f64
}

fn state_for(kind: IntervalKind) -> SessionState {
    match kind {
        IntervalKind::Focus => SessionState::InFocusInterval,
        IntervalKind::Break => SessionState::InBreakInterval,
    }
}

pub fn derive(
    day: &Day,
    tracker: &IntentionTracker,
    now: DateTime<Utc>,
    intention_grace: Duration,
) -> SessionView {
    if let Some(interval) = current_interval(day, now) {
        let in_grace = interval.is_focus()
            && tracker.intention(interval.id).is_none()
            && now - interval.start < intention_grace;
        return SessionView {
            state: state_for(interval.kind),
            interval: Some(interval.clone()),
            progress_fraction: raw_progress(interval, now).clamp(0.0, 1.0),
            overdue: false,
            in_grace,
        };
    }

    let before_day = day
        .intervals
        .first()
        .map_or(now < day.base_day_start, |first| now < first.start);
    if before_day {
        return SessionView {
            state: SessionState::BeforeDay,
            interval: None,
            progress_fraction: 0.0,
            overdue: false,
            in_grace: false,
        };
    }

    let last = day.last_ended(now);
    let after_day = day.end().map_or(true, |end| now >= end);
    let state = match (after_day, last) {
        (true, _) | (false, None) => SessionState::AfterDay,
        (false, Some(prev)) => state_for(prev.kind),
    };
    SessionView {
        state,
        interval: last.cloned(),
        progress_fraction: if last.is_some() { 1.0 } else { 0.0 },
        overdue: last.map_or(false, |prev| raw_progress(prev, now) > 1.0),
        in_grace: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{generate, IntervalId, ScheduleRules};
    use chrono::{NaiveDate, TimeZone};

    fn rules() -> ScheduleRules {
        ScheduleRules {
            utc_offset_minutes: Some(0),
            ..ScheduleRules::default()
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn view(day: &Day, now: DateTime<Utc>) -> SessionView {
        derive(day, &IntentionTracker::default(), now, Duration::minutes(4))
    }

    fn monday(rules: &ScheduleRules) -> Day {
        generate(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), rules)
    }

    #[test]
    fn states_follow_the_clock() {
        let day = monday(&rules());
        assert_eq!(view(&day, at(8, 0)).state, SessionState::BeforeDay);
        assert_eq!(view(&day, at(9, 0)).state, SessionState::InFocusInterval);
        assert_eq!(view(&day, at(9, 27)).state, SessionState::InBreakInterval);
        assert_eq!(view(&day, at(17, 0)).state, SessionState::AfterDay);
    }

    #[test]
    fn progress_is_elapsed_share() {
        let day = monday(&rules());
        let v = view(&day, at(9, 10));
        assert_eq!(v.interval.as_ref().unwrap().id, IntervalId(1));
        assert!((v.progress_fraction - 0.4).abs() < 1e-9);
        assert!(!v.overdue);
    }

    #[test]
    fn grace_window_only_without_intention() {
        let day = monday(&rules());
        assert!(view(&day, at(9, 2)).in_grace);
        assert!(!view(&day, at(9, 5)).in_grace);

        let mut tracker = IntentionTracker::default();
        tracker.set_intention(&day, IntervalId(1), "x", None, at(9, 1)).unwrap();
        assert!(!derive(&day, &tracker, at(9, 2), Duration::minutes(4)).in_grace);
    }

    #[test]
    fn gaps_report_the_previous_interval_as_overdue() {
        let day = monday(&ScheduleRules {
            buffer_minutes: 10,
            ..rules()
        });
        let v = view(&day, at(9, 35));
        assert_eq!(v.state, SessionState::InBreakInterval);
        assert_eq!(v.interval.unwrap().id, IntervalId(2));
        assert_eq!(v.progress_fraction, 1.0);
        assert!(v.overdue);
    }

    #[test]
    fn after_day_clamps_progress() {
        let day = monday(&rules());
        let v = view(&day, at(18, 0));
        assert_eq!(v.state, SessionState::AfterDay);
        assert_eq!(v.progress_fraction, 1.0);
        assert!(v.overdue);
        // Exactly at the end it has just finished.
        assert!(!view(&day, at(17, 0)).overdue);
    }

    #[test]
    fn empty_day_is_before_then_after() {
        let mut day = monday(&rules());
        day.intervals.clear();
        assert_eq!(view(&day, at(8, 0)).state, SessionState::BeforeDay);
        assert_eq!(view(&day, at(10, 0)).state, SessionState::AfterDay);
    }
}
