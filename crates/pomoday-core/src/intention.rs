//! Intentions and evaluations for focus intervals.
//!
//! Each focus interval carries at most one [`Intention`] and one
//! [`Evaluation`]. Evaluations are facts: once terminal they only change
//! through [`IntentionTracker::revise`], which keeps the prior outcome.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ValidationError};
use crate::schedule::{Day, Interval, IntervalId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intention {
    pub interval_id: IntervalId,
    pub description: String,
    pub estimated_pomodoros: Option<u32>,
    pub set_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Distracted,
    #[default]
    Unevaluated,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::Unevaluated
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub previous: Outcome,
    pub revised_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub interval_id: IntervalId,
    pub outcome: Outcome,
    pub evaluated_at: Option<DateTime<Utc>>,
    /// Marked distracted by the user before the interval ended.
    #[serde(default)]
    pub abandoned: bool,
    #[serde(default)]
    pub revisions: Vec<Revision>,
}

impl Evaluation {
    fn unevaluated(interval_id: IntervalId) -> Self {
        Self {
            interval_id,
            outcome: Outcome::Unevaluated,
            evaluated_at: None,
            abandoned: false,
            revisions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentionTracker {
    #[serde(default)]
    intentions: BTreeMap<IntervalId, Intention>,
    #[serde(default)]
    evaluations: BTreeMap<IntervalId, Evaluation>,
}

fn focus_interval(day: &Day, id: IntervalId) -> Result<&Interval, EngineError> {
    let interval = day.interval(id).ok_or(EngineError::UnknownInterval(id))?;
    if !interval.is_focus() {
        return Err(EngineError::NotAFocusInterval(id));
    }
    Ok(interval)
}

fn require_verdict(outcome: Outcome) -> Result<(), EngineError> {
    if outcome.is_terminal() {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: "outcome".into(),
            message: "must be success or distracted".into(),
        }
        .into())
    }
}

impl IntentionTracker {
    pub fn intention(&self, id: IntervalId) -> Option<&Intention> {
        self.intentions.get(&id)
    }

    pub fn intentions(&self) -> impl Iterator<Item = &Intention> {
        self.intentions.values()
    }

    pub fn evaluations(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.values()
    }

    /// The recorded evaluation, or an unevaluated placeholder.
    pub fn evaluation(&self, id: IntervalId) -> Evaluation {
        self.evaluations
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Evaluation::unevaluated(id))
    }

    pub fn outcome(&self, id: IntervalId) -> Outcome {
        self.evaluations
            .get(&id)
            .map_or(Outcome::Unevaluated, |e| e.outcome)
    }

    /// Attach (or replace) the intention for a focus interval that has not
    /// ended yet.
    pub fn set_intention(
        &mut self,
        day: &Day,
        id: IntervalId,
        description: &str,
        estimated_pomodoros: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<Intention, EngineError> {
        let interval = focus_interval(day, id)?;
        if day.sealed || interval.has_ended(now) {
            return Err(EngineError::IntervalAlreadyEnded(id));
        }
        if self.outcome(id).is_terminal() {
            return Err(EngineError::AlreadyEvaluated(id));
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "description".into(),
                message: "must not be empty".into(),
            }
            .into());
        }
        if estimated_pomodoros == Some(0) {
            return Err(ValidationError::InvalidValue {
                field: "estimated_pomodoros".into(),
                message: "must be at least 1".into(),
            }
            .into());
        }
        let intention = Intention {
            interval_id: id,
            description: description.to_string(),
            estimated_pomodoros,
            set_at: now,
        };
        self.intentions.insert(id, intention.clone());
        Ok(intention)
    }

    /// Record the user's verdict on an ended interval.
    pub fn evaluate(
        &mut self,
        day: &Day,
        id: IntervalId,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EngineError> {
        let interval = focus_interval(day, id)?;
        require_verdict(outcome)?;
        if self.outcome(id).is_terminal() {
            return Err(EngineError::AlreadyEvaluated(id));
        }
        if self.intention(id).is_none() {
            return Err(EngineError::NoIntentionSet(id));
        }
        if !interval.has_ended(now) {
            return Err(EngineError::EvaluationTooEarly(id));
        }
        let evaluation = Evaluation {
            outcome,
            evaluated_at: Some(now),
            ..Evaluation::unevaluated(id)
        };
        self.evaluations.insert(id, evaluation.clone());
        Ok(evaluation)
    }

    /// Change a terminal outcome, keeping the old one in `revisions`.
    ///
    /// On an interval that has no verdict yet this is the same as
    /// [`evaluate`](Self::evaluate).
    pub fn revise(
        &mut self,
        day: &Day,
        id: IntervalId,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EngineError> {
        focus_interval(day, id)?;
        require_verdict(outcome)?;
        if !self.outcome(id).is_terminal() {
            return self.evaluate(day, id, outcome, now);
        }
        // An abandoned interval may have no intention; it cannot become a success.
        if outcome == Outcome::Success && self.intention(id).is_none() {
            return Err(EngineError::NoIntentionSet(id));
        }
        let existing = self
            .evaluations
            .get_mut(&id)
            .ok_or(EngineError::NoIntentionSet(id))?;
        existing.revisions.push(Revision {
            previous: existing.outcome,
            revised_at: now,
        });
        existing.outcome = outcome;
        existing.evaluated_at = Some(now);
        Ok(existing.clone())
    }

    /// Give up on an interval before it ends. Repeating it is a no-op.
    pub fn abandon(
        &mut self,
        day: &Day,
        id: IntervalId,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EngineError> {
        let interval = focus_interval(day, id)?;
        if let Some(existing) = self.evaluations.get(&id) {
            if existing.abandoned {
                return Ok(existing.clone());
            }
            if existing.outcome.is_terminal() {
                return Err(EngineError::AlreadyEvaluated(id));
            }
        }
        if day.sealed || interval.has_ended(now) {
            return Err(EngineError::IntervalAlreadyEnded(id));
        }
        let evaluation = Evaluation {
            outcome: Outcome::Distracted,
            evaluated_at: Some(now),
            abandoned: true,
            ..Evaluation::unevaluated(id)
        };
        self.evaluations.insert(id, evaluation.clone());
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{generate, ScheduleRules};
    use chrono::{NaiveDate, TimeZone};

    fn day() -> Day {
        let rules = ScheduleRules {
            utc_offset_minutes: Some(0),
            ..ScheduleRules::default()
        };
        generate(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), &rules)
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[test]
    fn set_then_read_returns_same_intention() {
        let day = day();
        let mut tracker = IntentionTracker::default();
        tracker
            .set_intention(&day, IntervalId(1), "  write report ", Some(1), at(9, 10))
            .unwrap();
        let read = tracker.intention(IntervalId(1)).unwrap();
        assert_eq!(read.description, "write report");
        assert_eq!(read.estimated_pomodoros, Some(1));
        assert_eq!(read.set_at, at(9, 10));
    }

    #[test]
    fn intention_can_be_replaced_until_the_interval_ends() {
        let day = day();
        let mut tracker = IntentionTracker::default();
        tracker.set_intention(&day, IntervalId(1), "a", None, at(9, 1)).unwrap();
        tracker.set_intention(&day, IntervalId(1), "b", Some(2), at(9, 2)).unwrap();
        assert_eq!(tracker.intention(IntervalId(1)).unwrap().description, "b");
        assert_eq!(
            tracker.set_intention(&day, IntervalId(1), "c", None, at(9, 25)),
            Err(EngineError::IntervalAlreadyEnded(IntervalId(1)))
        );
    }

    #[test]
    fn breaks_and_bad_input_are_rejected() {
        let day = day();
        let mut tracker = IntentionTracker::default();
        assert_eq!(
            tracker.set_intention(&day, IntervalId(2), "rest", None, at(9, 0)),
            Err(EngineError::NotAFocusInterval(IntervalId(2)))
        );
        assert_eq!(
            tracker.set_intention(&day, IntervalId(99), "x", None, at(9, 0)),
            Err(EngineError::UnknownInterval(IntervalId(99)))
        );
        assert!(matches!(
            tracker.set_intention(&day, IntervalId(1), "   ", None, at(9, 0)),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            tracker.set_intention(&day, IntervalId(1), "x", Some(0), at(9, 0)),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn evaluation_requires_intention_and_an_ended_interval() {
        let day = day();
        let mut tracker = IntentionTracker::default();
        assert_eq!(
            tracker.evaluate(&day, IntervalId(1), Outcome::Success, at(9, 30)),
            Err(EngineError::NoIntentionSet(IntervalId(1)))
        );
        tracker.set_intention(&day, IntervalId(1), "a", None, at(9, 1)).unwrap();
        assert_eq!(
            tracker.evaluate(&day, IntervalId(1), Outcome::Success, at(9, 10)),
            Err(EngineError::EvaluationTooEarly(IntervalId(1)))
        );
        let eval = tracker
            .evaluate(&day, IntervalId(1), Outcome::Success, at(9, 26))
            .unwrap();
        assert_eq!(eval.outcome, Outcome::Success);
    }

    #[test]
    fn second_evaluation_fails_and_revise_keeps_history() {
        let day = day();
        let mut tracker = IntentionTracker::default();
        tracker.set_intention(&day, IntervalId(1), "a", None, at(9, 1)).unwrap();
        tracker
            .evaluate(&day, IntervalId(1), Outcome::Success, at(9, 26))
            .unwrap();
        let before = tracker.clone();
        assert_eq!(
            tracker.evaluate(&day, IntervalId(1), Outcome::Distracted, at(9, 27)),
            Err(EngineError::AlreadyEvaluated(IntervalId(1)))
        );
        assert_eq!(tracker, before);

        let revised = tracker
            .revise(&day, IntervalId(1), Outcome::Distracted, at(9, 28))
            .unwrap();
        assert_eq!(revised.outcome, Outcome::Distracted);
        assert_eq!(
            revised.revisions,
            vec![Revision {
                previous: Outcome::Success,
                revised_at: at(9, 28)
            }]
        );
    }

    #[test]
    fn abandon_is_idempotent_and_blocks_new_intentions() {
        let day = day();
        let mut tracker = IntentionTracker::default();
        let first = tracker.abandon(&day, IntervalId(1), at(9, 5)).unwrap();
        let second = tracker.abandon(&day, IntervalId(1), at(9, 6)).unwrap();
        assert_eq!(first, second);
        assert_eq!(tracker.outcome(IntervalId(1)), Outcome::Distracted);
        assert_eq!(
            tracker.set_intention(&day, IntervalId(1), "again", None, at(9, 7)),
            Err(EngineError::AlreadyEvaluated(IntervalId(1)))
        );
        assert_eq!(
            tracker.abandon(&day, IntervalId(3), at(10, 0)),
            Err(EngineError::IntervalAlreadyEnded(IntervalId(3)))
        );
    }

    #[test]
    fn abandoned_interval_without_intention_is_already_evaluated() {
        let day = day();
        let mut tracker = IntentionTracker::default();
        tracker.abandon(&day, IntervalId(1), at(9, 10)).unwrap();
        assert_eq!(
            tracker.evaluate(&day, IntervalId(1), Outcome::Success, at(9, 30)),
            Err(EngineError::AlreadyEvaluated(IntervalId(1)))
        );
    }

    #[test]
    fn tracker_survives_json_round_trip() {
        let day = day();
        let mut tracker = IntentionTracker::default();
        tracker.set_intention(&day, IntervalId(1), "a", Some(3), at(9, 1)).unwrap();
        tracker.abandon(&day, IntervalId(3), at(9, 31)).unwrap();
        let json = serde_json::to_string(&tracker).unwrap();
        let back: IntentionTracker = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tracker);
    }
}
