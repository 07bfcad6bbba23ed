//! End-to-end scenarios for a 09:00-17:00 day with 25/5 intervals.
//!
//! These drive the engine through a manual clock exactly as the
//! presentation layer would.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use pomoday_core::{
    DayEngine, EngineError, EngineOptions, InMemoryDayStore, IntervalBounds, IntervalId,
    ManualClock, Namespace, Outcome, ScheduleRules, ScoringPolicy, SessionState,
};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

fn start(now: DateTime<Utc>) -> (DayEngine, ManualClock) {
    let clock = ManualClock::new(now);
    let options = EngineOptions {
        namespace: Namespace::Live,
        rules: ScheduleRules {
            utc_offset_minutes: Some(0),
            ..ScheduleRules::default()
        },
        scoring: ScoringPolicy::default(),
    };
    let engine = DayEngine::start(
        Arc::new(clock.clone()),
        Arc::new(InMemoryDayStore::new()),
        options,
    )
    .unwrap();
    (engine, clock)
}

#[test]
fn intention_then_success_scores_two_points() {
    let (engine, clock) = start(at(9, 10));

    let snap = engine.snapshot();
    assert_eq!(snap.session.state, SessionState::InFocusInterval);
    let current = snap.session.interval.as_ref().unwrap();
    assert_eq!(current.id, IntervalId(1));
    assert!((snap.session.progress_fraction - 0.4).abs() < 1e-9);
    assert!(!snap.session.in_grace);

    engine
        .set_intention(IntervalId(1), "write report", Some(1), Some(snap.revision))
        .unwrap();

    clock.set(at(9, 26));
    engine.evaluate(IntervalId(1), Outcome::Success, None).unwrap();

    let snap = engine.snapshot();
    assert_eq!(snap.session.state, SessionState::InBreakInterval);
    assert_eq!(snap.score.success_points, 2);
    assert_eq!(snap.score.distraction_points, 0);
    assert_eq!(snap.score.evaluable_count, 0);
}

#[test]
fn unplanned_intervals_become_distractions_at_day_close() {
    let (engine, clock) = start(at(8, 30));

    clock.set(at(10, 5));
    let snap = engine.snapshot();
    assert_eq!(snap.score.evaluable_count, 2);
    assert_eq!(snap.score.distraction_points, 0);

    clock.set(at(17, 0));
    let snap = engine.snapshot();
    assert_eq!(snap.session.state, SessionState::AfterDay);
    assert_eq!(snap.score.distraction_points, 16);
    assert_eq!(snap.score.evaluable_count, 0);
    assert_eq!(snap.score.remaining_count, 0);
}

#[test]
fn editing_a_future_interval_shifts_the_rest_and_ended_ones_are_locked() {
    let (engine, _) = start(at(9, 26));
    let before = engine.snapshot().day;

    let edited = engine
        .edit_interval(
            IntervalId(3),
            IntervalBounds {
                start: at(9, 30),
                end: at(10, 5),
            },
            None,
        )
        .unwrap();
    assert_eq!(edited.end, at(10, 5));

    let after = engine.snapshot().day;
    for (old, new) in before.intervals.iter().zip(&after.intervals).skip(3) {
        assert_eq!(new.start - old.start, Duration::minutes(10));
        assert_eq!(new.end - old.end, Duration::minutes(10));
    }

    let err = engine
        .edit_interval(
            IntervalId(1),
            IntervalBounds {
                start: at(9, 0),
                end: at(9, 30),
            },
            None,
        )
        .unwrap_err();
    assert_eq!(err, EngineError::IntervalLocked(IntervalId(1)));
    assert_eq!(engine.snapshot().day, after);
}

#[test]
fn double_evaluation_leaves_the_score_unchanged() {
    let (engine, clock) = start(at(9, 0));
    engine.set_intention(IntervalId(1), "inbox zero", None, None).unwrap();
    clock.set(at(9, 25));
    engine.evaluate(IntervalId(1), Outcome::Success, None).unwrap();
    let first = engine.snapshot();

    let err = engine
        .evaluate(IntervalId(1), Outcome::Distracted, None)
        .unwrap_err();
    assert_eq!(err, EngineError::AlreadyEvaluated(IntervalId(1)));
    let second = engine.snapshot();
    assert_eq!(second.score, first.score);
    assert_eq!(second.revision, first.revision);
}

#[test]
fn revise_is_the_explicit_way_to_change_a_verdict() {
    let (engine, clock) = start(at(9, 0));
    engine.set_intention(IntervalId(1), "inbox zero", None, None).unwrap();
    clock.set(at(9, 30));
    engine.evaluate(IntervalId(1), Outcome::Success, None).unwrap();
    let revised = engine.revise(IntervalId(1), Outcome::Distracted, None).unwrap();

    assert_eq!(revised.revisions.len(), 1);
    assert_eq!(revised.revisions[0].previous, Outcome::Success);
    let snap = engine.snapshot();
    assert_eq!(snap.outcome(IntervalId(1)), Outcome::Distracted);
    // The planning bonus stays; only the verdict moved.
    assert_eq!(snap.score.success_points, 1);
    assert_eq!(snap.score.distraction_points, 1);
}

#[test]
fn score_reads_are_idempotent() {
    let (engine, clock) = start(at(9, 0));
    engine.set_intention(IntervalId(1), "a", None, None).unwrap();
    clock.set(at(11, 0));
    let a = engine.snapshot();
    let b = engine.snapshot();
    assert_eq!(a.score, b.score);
    assert_eq!(a.label, b.label);
}
