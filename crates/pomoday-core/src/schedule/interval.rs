use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Position of an interval within its day, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalId(pub u32);

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    Focus,
    Break,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub id: IntervalId,
    pub kind: IntervalKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open containment: `[start, end)`.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start
    }

    /// An interval is ended (and locked) from its end instant on.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }

    pub fn is_focus(&self) -> bool {
        self.kind == IntervalKind::Focus
    }

    pub(crate) fn shifted(&self, delta: Duration) -> Self {
        Self {
            start: self.start + delta,
            end: self.end + delta,
            ..self.clone()
        }
    }
}

/// One day's schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    /// Logical date this schedule belongs to.
    pub date: NaiveDate,
    /// Anchor no interval may start before.
    pub base_day_start: DateTime<Utc>,
    pub intervals: Vec<Interval>,
    /// Archived days are read-only.
    #[serde(default)]
    pub sealed: bool,
}

impl Day {
    pub fn interval(&self, id: IntervalId) -> Option<&Interval> {
        self.intervals.iter().find(|i| i.id == id)
    }

    pub(crate) fn position(&self, id: IntervalId) -> Option<usize> {
        self.intervals.iter().position(|i| i.id == id)
    }

    /// End of the last interval, if there is one.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.intervals.last().map(|i| i.end)
    }

    /// A day is closed once its last interval has ended or it has been sealed.
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.sealed || self.end().map_or(true, |end| now >= end)
    }

    pub fn focus_intervals(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter().filter(|i| i.is_focus())
    }

    pub(crate) fn next_id(&self) -> IntervalId {
        IntervalId(self.intervals.iter().map(|i| i.id.0).max().unwrap_or(0) + 1)
    }

    /// Most recent interval whose end is at or before `now`.
    pub fn last_ended(&self, now: DateTime<Utc>) -> Option<&Interval> {
        self.intervals.iter().rev().find(|i| i.has_ended(now))
    }

    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }
}
