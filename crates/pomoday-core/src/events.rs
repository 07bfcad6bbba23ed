use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::intention::Outcome;
use crate::schedule::{Day, IntervalId, IntervalKind};

/// Every state change in the system produces an Event.
/// Observers subscribe through the engine's broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    IntervalStarted {
        interval_id: IntervalId,
        kind: IntervalKind,
        at: DateTime<Utc>,
    },
    IntervalEnded {
        interval_id: IntervalId,
        kind: IntervalKind,
        /// False for a focus interval that elapsed with no intention.
        intention_set: bool,
        at: DateTime<Utc>,
    },
    /// The last interval of the day has ended.
    DayOver {
        date: NaiveDate,
        at: DateTime<Utc>,
    },
    /// The logical date changed; the old day was sealed and archived.
    DayRolledOver {
        archived: NaiveDate,
        started: NaiveDate,
        at: DateTime<Utc>,
    },
    IntentionSet {
        interval_id: IntervalId,
        description: String,
        at: DateTime<Utc>,
    },
    IntervalEvaluated {
        interval_id: IntervalId,
        outcome: Outcome,
        abandoned: bool,
        at: DateTime<Utc>,
    },
    ScheduleChanged {
        revision: u64,
        at: DateTime<Utc>,
    },
    PersistenceFailed {
        message: String,
        at: DateTime<Utc>,
    },
}

/// Boundaries crossed while the clock moved from `since` (exclusive) to
/// `now` (inclusive).
pub fn transitions(
    day: &Day,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
    intention_set: impl Fn(IntervalId) -> bool,
) -> Vec<Event> {
    let crossed = |t: DateTime<Utc>| since < t && t <= now;
    let mut events = Vec::new();
    for interval in &day.intervals {
        if crossed(interval.end) {
            events.push(Event::IntervalEnded {
                interval_id: interval.id,
                kind: interval.kind,
                intention_set: interval.kind == IntervalKind::Break || intention_set(interval.id),
                at: interval.end,
            });
        }
        if crossed(interval.start) {
            events.push(Event::IntervalStarted {
                interval_id: interval.id,
                kind: interval.kind,
                at: interval.start,
            });
        }
    }
    if let Some(end) = day.end().filter(|end| crossed(*end)) {
        events.push(Event::DayOver {
            date: day.date,
            at: end,
        });
    }
    events.sort_by_key(|e| match e {
        Event::IntervalEnded { at, .. } => (*at, 0),
        Event::IntervalStarted { at, .. } => (*at, 1),
        Event::DayOver { at, .. } => (*at, 2),
        _ => (now, 3),
    });
    events
}
