//! Changes to an existing day.
//!
//! Every function here takes the current day by reference and returns a
//! new one; the input is never modified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::interval::{Day, Interval, IntervalId, IntervalKind};
use super::rules::ScheduleRules;
use crate::error::{EngineError, ValidationError};
use crate::intention::IntentionTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn invalid(interval: IntervalId, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidScheduleEdit {
        interval,
        reason: reason.into(),
    }
}

/// Move one interval's bounds and shift every later interval by the change
/// in its end time.
pub fn edit_interval(
    day: &Day,
    id: IntervalId,
    bounds: IntervalBounds,
    now: DateTime<Utc>,
    tracker: &IntentionTracker,
) -> Result<Day, EngineError> {
    if day.sealed {
        return Err(EngineError::IntervalLocked(id));
    }
    let idx = day.position(id).ok_or(EngineError::UnknownInterval(id))?;
    let current = &day.intervals[idx];
    if current.has_ended(now) {
        return Err(EngineError::IntervalLocked(id));
    }

    let IntervalBounds { start, end } = bounds;
    if end <= start {
        return Err(ValidationError::InvalidTimeRange { start, end }.into());
    }
    if start < day.base_day_start {
        return Err(invalid(id, "start is before the start of the day"));
    }
    if let Some(prev) = idx.checked_sub(1).map(|p| &day.intervals[p]) {
        if start < prev.end {
            return Err(invalid(id, format!("would overlap interval {}", prev.id)));
        }
    }
    if end <= now {
        return Err(invalid(id, "end would already be in the past"));
    }
    if current.has_started(now) {
        if start > now {
            return Err(invalid(id, "interval is under way; its start cannot move past now"));
        }
    } else if start < now {
        return Err(invalid(id, "interval has not started; its start cannot move into the past"));
    }
    if current.kind == IntervalKind::Focus {
        if let Some(intention) = tracker.intention(id) {
            let set_during = current.contains(intention.set_at);
            if set_during && !(start <= intention.set_at && intention.set_at < end) {
                return Err(invalid(
                    id,
                    format!("would orphan the intention set at {}", intention.set_at),
                ));
            }
        }
    }

    let delta = end - current.end;
    let mut edited = day.clone();
    edited.intervals[idx].start = start;
    edited.intervals[idx].end = end;
    for later in edited.intervals.iter_mut().skip(idx + 1) {
        *later = later.shifted(delta);
    }
    Ok(edited)
}

/// Append an extra focus/break pair at `max(now, end of day)`.
pub fn add_bonus_pomodoro(
    day: &Day,
    now: DateTime<Utc>,
    rules: &ScheduleRules,
) -> Result<(Day, IntervalId), EngineError> {
    let focus_id = day.next_id();
    if day.sealed {
        return Err(EngineError::IntervalLocked(focus_id));
    }
    let start = day.end().unwrap_or(day.base_day_start).max(now);
    let focus_end = start + rules.focus_length();
    let mut extended = day.clone();
    extended.intervals.push(Interval {
        id: focus_id,
        kind: IntervalKind::Focus,
        start,
        end: focus_end,
    });
    extended.intervals.push(Interval {
        id: IntervalId(focus_id.0 + 1),
        kind: IntervalKind::Break,
        start: focus_end,
        end: focus_end + rules.break_length(),
    });
    Ok((extended, focus_id))
}

/// Drop an interval that has not started yet. Later intervals keep their
/// times.
pub fn remove_interval(
    day: &Day,
    id: IntervalId,
    now: DateTime<Utc>,
    tracker: &IntentionTracker,
) -> Result<Day, EngineError> {
    if day.sealed {
        return Err(EngineError::IntervalLocked(id));
    }
    let idx = day.position(id).ok_or(EngineError::UnknownInterval(id))?;
    if day.intervals[idx].has_started(now) {
        return Err(EngineError::IntervalLocked(id));
    }
    if tracker.intention(id).is_some() {
        return Err(invalid(id, "interval has an intention"));
    }
    let mut trimmed = day.clone();
    trimmed.intervals.remove(idx);
    Ok(trimmed)
}
