//! Day scoring.
//!
//! The score is never stored. [`score`] derives it from the day, the
//! tracker and the current time every time it is asked, so it cannot drift
//! from the intention/evaluation state it summarises.
//!
//! | Event | Counter | Default weight |
//! |-------|---------|----------------|
//! | focus interval evaluated success | success | 1 |
//! | intention set in time (planning bonus) | success | 1 |
//! | focus interval evaluated distracted | distraction | 1 |
//! | focus interval ended with no intention, once the day is closed | distraction | 1 |

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::intention::{IntentionTracker, Outcome};
use crate::schedule::Day;

/// Point weights, the `[scoring]` table of `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    #[serde(default = "default_weight")]
    pub success: u32,
    #[serde(default = "default_weight")]
    pub planning_bonus: u32,
    /// Latest time after an interval's start at which setting the intention
    /// still earns the planning bonus. Unset means any time before the end.
    #[serde(default)]
    pub planning_grace_minutes: Option<u32>,
    #[serde(default = "default_weight")]
    pub distraction: u32,
    #[serde(default = "default_weight")]
    pub missing_intention: u32,
}

fn default_weight() -> u32 {
    1
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            success: 1,
            planning_bonus: 1,
            planning_grace_minutes: None,
            distraction: 1,
            missing_intention: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub success_points: u32,
    pub distraction_points: u32,
    /// Ended focus intervals still waiting for a verdict.
    pub evaluable_count: u32,
    /// Intervals that have not started yet.
    pub remaining_count: u32,
}

impl ScoreSnapshot {
    /// One-line summary for a status bar, e.g. `🍅: 3✓ 1✗ 2? 10…`.
    pub fn label(&self) -> String {
        let icon = if self.success_points > self.distraction_points {
            "🍅"
        } else {
            "🥫"
        };
        let mut label = format!(
            "{icon}: {}✓ {}✗",
            self.success_points, self.distraction_points
        );
        if self.evaluable_count > 0 {
            label.push_str(&format!(" {}?", self.evaluable_count));
        }
        if self.remaining_count > 0 {
            label.push_str(&format!(" {}…", self.remaining_count));
        }
        label
    }
}

pub fn score(
    day: &Day,
    tracker: &IntentionTracker,
    now: DateTime<Utc>,
    policy: &ScoringPolicy,
) -> ScoreSnapshot {
    let closed = day.is_closed(now);
    let mut snapshot = ScoreSnapshot::default();

    for interval in &day.intervals {
        if interval.start > now {
            snapshot.remaining_count += 1;
        }
        if !interval.is_focus() {
            continue;
        }
        let intention = tracker.intention(interval.id);
        if let Some(intention) = intention {
            let deadline = policy
                .planning_grace_minutes
                .map_or(interval.end, |m| {
                    interval.start + Duration::minutes(i64::from(m))
                });
            if intention.set_at <= deadline {
                snapshot.success_points += policy.planning_bonus;
            }
        }
        match tracker.outcome(interval.id) {
            Outcome::Success => snapshot.success_points += policy.success,
            Outcome::Distracted => snapshot.distraction_points += policy.distraction,
            Outcome::Unevaluated if interval.has_ended(now) => {
                if intention.is_none() && closed {
                    snapshot.distraction_points += policy.missing_intention;
                } else {
                    snapshot.evaluable_count += 1;
                }
            }
            Outcome::Unevaluated => {}
        }
    }
    snapshot
}
