//! The day engine: owner of the published day snapshot.
//!
//! Within a process, one `DayEngine` per namespace is the only writer of
//! the day's schedule and intentions; everything else reads
//! [`EngineSnapshot`]s.
//!
//! ## Consistency
//!
//! Mutations are serialised by a writer lock. Each one clones the current
//! state, applies the change to the clone, and swaps in a new `Arc` with
//! `revision + 1`. Readers only ever clone the `Arc`, so they see either the
//! old state or the new one, never a mix. A caller that passes
//! `expected_revision` gets [`EngineError::ConflictingMutation`] when someone
//! else wrote first.
//!
//! ## Persistence
//!
//! The new state is published before it is saved. A failed save does not
//! undo the change; it is logged, broadcast as [`Event::PersistenceFailed`]
//! and returned as [`EngineError::PersistenceFailure`]. Unsaved state,
//! including the archive of a rolled-over day, is written again on the
//! next mutation or tick.
//!
//! ## Other processes
//!
//! Several engines may open the same namespace, e.g. a long-running
//! `watch` next to one-shot commands. Before every mutation and tick the
//! engine re-reads the store and adopts a day some other process wrote.
//! Store writes are compare-and-swap on the row version, so a write that
//! raced another process fails with [`EngineError::ConflictingMutation`]
//! and the engine switches to the stored day instead of overwriting it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::{CoreError, EngineError, Result};
use crate::events::{transitions, Event};
use crate::intention::{Evaluation, Intention, Outcome};
use crate::schedule::{self, generate, Day, Interval, IntervalBounds, IntervalId, ScheduleRules};
use crate::scoring::{score, ScoreSnapshot, ScoringPolicy};
use crate::session::{self, SessionView};
use crate::storage::{Config, DayRecord, DayStore, Namespace, StoredDay};

const EVENT_CAPACITY: usize = 256;

/// Startup parameters, fixed for the life of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub namespace: Namespace,
    pub rules: ScheduleRules,
    pub scoring: ScoringPolicy,
}

impl EngineOptions {
    pub fn from_config(namespace: Namespace, config: &Config) -> Self {
        Self {
            namespace,
            rules: config.schedule.clone(),
            scoring: config.scoring.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DayState {
    revision: u64,
    record: DayRecord,
}

struct WriterState {
    last_tick: DateTime<Utc>,
    /// Store version of the active day's row; `None` until it is written.
    stored_version: Option<u64>,
    /// Engine revision last written to the store.
    saved_revision: Option<u64>,
    /// Sealed days whose archive write has not gone through yet, oldest first.
    unarchived: Vec<PendingArchive>,
}

struct PendingArchive {
    record: DayRecord,
    version: Option<u64>,
}

/// Read-only view of the day at one instant.
///
/// Everything in here was computed from the same published state and the
/// same clock reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub revision: u64,
    pub namespace: Namespace,
    pub at: DateTime<Utc>,
    pub day: Day,
    pub intentions: Vec<Intention>,
    pub evaluations: Vec<Evaluation>,
    pub session: SessionView,
    pub score: ScoreSnapshot,
    pub label: String,
}

impl EngineSnapshot {
    pub fn interval(&self, id: IntervalId) -> Option<&Interval> {
        self.day.interval(id)
    }

    pub fn intention(&self, id: IntervalId) -> Option<&Intention> {
        self.intentions.iter().find(|i| i.interval_id == id)
    }

    /// Recorded evaluation for `id`; unevaluated intervals have none.
    pub fn evaluation(&self, id: IntervalId) -> Option<&Evaluation> {
        self.evaluations.iter().find(|e| e.interval_id == id)
    }

    pub fn outcome(&self, id: IntervalId) -> Outcome {
        self.evaluation(id).map_or(Outcome::Unevaluated, |e| e.outcome)
    }
}

/// Score summary of an archived day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub score: ScoreSnapshot,
    pub label: String,
}

/// Result of one [`DayEngine::tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub at: DateTime<Utc>,
    /// Events for boundaries crossed since the previous tick, in order.
    pub events: Vec<Event>,
}

pub struct DayEngine {
    clock: Arc<dyn Clock>,
    store: Arc<dyn DayStore>,
    namespace: Namespace,
    rules: ScheduleRules,
    scoring: ScoringPolicy,
    state: RwLock<Arc<DayState>>,
    writer: Mutex<WriterState>,
    events: broadcast::Sender<Event>,
}

impl DayEngine {
    /// Load the namespace's active day, or create today's.
    ///
    /// A stored day from an earlier logical date is sealed and archived
    /// before a fresh one is generated.
    ///
    /// # Errors
    /// Returns an error if the rules are invalid or the store cannot be read
    /// or written.
    pub fn start(
        clock: Arc<dyn Clock>,
        store: Arc<dyn DayStore>,
        options: EngineOptions,
    ) -> Result<Self> {
        let EngineOptions {
            namespace,
            rules,
            scoring,
        } = options;
        rules.validate()?;

        let now = clock.now();
        let today = rules.logical_date(now);
        let (record, version) = match store.load(namespace)? {
            Some(stored) if stored.record.day.date >= today => {
                info!(%namespace, date = %stored.record.day.date, "resuming day");
                (stored.record, stored.version)
            }
            Some(StoredDay { version, record }) => {
                info!(%namespace, archived = %record.day.date, started = %today, "archiving stale day");
                store.archive(
                    namespace,
                    &DayRecord {
                        day: record.day.sealed(),
                        tracker: record.tracker,
                    },
                    Some(version),
                )?;
                let fresh = fresh_record(today, &rules);
                let version = store.save(namespace, &fresh, None)?;
                (fresh, version)
            }
            None => {
                info!(%namespace, date = %today, "starting new day");
                let fresh = fresh_record(today, &rules);
                let version = store.save(namespace, &fresh, None)?;
                (fresh, version)
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            clock,
            store,
            namespace,
            rules,
            scoring,
            state: RwLock::new(Arc::new(DayState {
                revision: 0,
                record,
            })),
            writer: Mutex::new(WriterState {
                last_tick: now,
                stored_version: Some(version),
                saved_revision: Some(0),
                unarchived: Vec::new(),
            }),
            events,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn rules(&self) -> &ScheduleRules {
        &self.rules
    }

    pub fn scoring(&self) -> &ScoringPolicy {
        &self.scoring
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn revision(&self) -> u64 {
        self.current().revision
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Everything the presentation layer shows, derived at one instant.
    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.current();
        let now = self.clock.now();
        let DayRecord { day, tracker } = &state.record;
        let session = session::derive(day, tracker, now, self.rules.intention_grace());
        let score = score(day, tracker, now, &self.scoring);
        EngineSnapshot {
            revision: state.revision,
            namespace: self.namespace,
            at: now,
            day: day.clone(),
            intentions: tracker.intentions().cloned().collect(),
            evaluations: tracker.evaluations().cloned().collect(),
            session,
            label: score.label(),
            score,
        }
    }

    /// Archived days, newest first.
    pub fn history(&self) -> Result<Vec<DaySummary>> {
        let now = self.clock.now();
        Ok(self
            .store
            .history(self.namespace)?
            .into_iter()
            .map(|record| {
                let score = score(&record.day, &record.tracker, now, &self.scoring);
                DaySummary {
                    date: record.day.date,
                    label: score.label(),
                    score,
                }
            })
            .collect())
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub fn set_intention(
        &self,
        id: IntervalId,
        description: &str,
        estimated_pomodoros: Option<u32>,
        expected_revision: Option<u64>,
    ) -> std::result::Result<Intention, EngineError> {
        self.mutate(expected_revision, |state, now| {
            let DayRecord { day, tracker } = &mut state.record;
            let intention = tracker.set_intention(day, id, description, estimated_pomodoros, now)?;
            let event = Event::IntentionSet {
                interval_id: id,
                description: intention.description.clone(),
                at: now,
            };
            Ok((intention, vec![event]))
        })
    }

    pub fn evaluate(
        &self,
        id: IntervalId,
        outcome: Outcome,
        expected_revision: Option<u64>,
    ) -> std::result::Result<Evaluation, EngineError> {
        self.mutate(expected_revision, |state, now| {
            let DayRecord { day, tracker } = &mut state.record;
            let evaluation = tracker.evaluate(day, id, outcome, now)?;
            Ok((evaluation.clone(), vec![evaluated(&evaluation, now)]))
        })
    }

    /// Change an existing verdict; the old outcome is kept in the audit trail.
    pub fn revise(
        &self,
        id: IntervalId,
        outcome: Outcome,
        expected_revision: Option<u64>,
    ) -> std::result::Result<Evaluation, EngineError> {
        self.mutate(expected_revision, |state, now| {
            let DayRecord { day, tracker } = &mut state.record;
            let evaluation = tracker.revise(day, id, outcome, now)?;
            Ok((evaluation.clone(), vec![evaluated(&evaluation, now)]))
        })
    }

    pub fn abandon(
        &self,
        id: IntervalId,
        expected_revision: Option<u64>,
    ) -> std::result::Result<Evaluation, EngineError> {
        self.mutate(expected_revision, |state, now| {
            let DayRecord { day, tracker } = &mut state.record;
            let evaluation = tracker.abandon(day, id, now)?;
            Ok((evaluation.clone(), vec![evaluated(&evaluation, now)]))
        })
    }

    /// Move an interval's bounds; later intervals shift with its end.
    pub fn edit_interval(
        &self,
        id: IntervalId,
        bounds: IntervalBounds,
        expected_revision: Option<u64>,
    ) -> std::result::Result<Interval, EngineError> {
        self.mutate(expected_revision, |state, now| {
            let edited = schedule::edit_interval(
                &state.record.day,
                id,
                bounds,
                now,
                &state.record.tracker,
            )?;
            let interval = edited
                .interval(id)
                .cloned()
                .ok_or(EngineError::UnknownInterval(id))?;
            state.record.day = edited;
            Ok((interval, Vec::new()))
        })
    }

    /// Append an extra focus/break pair after the day's last interval.
    pub fn add_bonus_pomodoro(
        &self,
        expected_revision: Option<u64>,
    ) -> std::result::Result<Interval, EngineError> {
        self.mutate(expected_revision, |state, now| {
            let (extended, id) = schedule::add_bonus_pomodoro(&state.record.day, now, &self.rules)?;
            let interval = extended
                .interval(id)
                .cloned()
                .ok_or(EngineError::UnknownInterval(id))?;
            state.record.day = extended;
            Ok((interval, Vec::new()))
        })
    }

    pub fn remove_interval(
        &self,
        id: IntervalId,
        expected_revision: Option<u64>,
    ) -> std::result::Result<(), EngineError> {
        self.mutate(expected_revision, |state, now| {
            state.record.day =
                schedule::remove_interval(&state.record.day, id, now, &state.record.tracker)?;
            Ok(((), Vec::new()))
        })
    }

    /// Advance to the clock's current reading.
    ///
    /// Picks up changes other processes saved, rolls the day over when the
    /// logical date has moved on, then reports every interval boundary
    /// crossed since the previous tick. The ending day's boundaries come
    /// before the rollover and the new day's after it. Events are also
    /// broadcast to subscribers.
    ///
    /// Save failures are broadcast as [`Event::PersistenceFailed`] and
    /// retried on the next tick; they do not fail the tick.
    pub fn tick(&self) -> std::result::Result<TickOutcome, EngineError> {
        let mut writer = self.lock_writer();
        let now = self.clock.now();
        let since = writer.last_tick;

        let before = self.current();
        let adopted = self.sync_from_store(&mut writer, now);
        let synced = self.current();
        let ending = if synced.record.day.date == before.record.day.date {
            synced
        } else {
            before
        };
        let mut events = self.crossed(&ending, since, now);
        events.extend(adopted);
        events.extend(self.roll_over(&mut writer, now));
        let current = self.current();
        if current.record.day.date != ending.record.day.date {
            events.extend(self.crossed(&current, since, now));
        }

        for event in &events {
            self.emit(event.clone());
        }
        self.flush(&mut writer, now);
        writer.last_tick = now;
        Ok(TickOutcome { at: now, events })
    }

    // ── Internals ────────────────────────────────────────────────────

    fn current(&self) -> Arc<DayState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, next: Arc<DayState>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn persistence_failed(&self, err: CoreError, now: DateTime<Utc>) -> EngineError {
        error!(namespace = %self.namespace, error = %err, "failed to persist day");
        self.emit(Event::PersistenceFailed {
            message: err.to_string(),
            at: now,
        });
        EngineError::PersistenceFailure(err.to_string())
    }

    fn crossed(&self, state: &DayState, since: DateTime<Utc>, now: DateTime<Utc>) -> Vec<Event> {
        let DayRecord { day, tracker } = &state.record;
        let events = transitions(day, since, now, |id| tracker.intention(id).is_some());
        for event in &events {
            if let Event::IntervalEnded {
                interval_id,
                intention_set: false,
                ..
            } = event
            {
                debug!(namespace = %self.namespace, interval = %interval_id, "focus interval ended without an intention");
            }
        }
        events
    }

    /// Adopt the stored day when another process wrote it since this
    /// engine last read or saved it.
    fn sync_from_store(&self, writer: &mut WriterState, now: DateTime<Utc>) -> Option<Event> {
        let stored = match self.store.load(self.namespace) {
            Ok(stored) => stored?,
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "could not re-read the stored day");
                return None;
            }
        };
        let current = self.current();
        let active = current.record.day.date;
        let date = stored.record.day.date;
        let foreign = date > active || (date == active && writer.stored_version != Some(stored.version));
        if !foreign {
            return None;
        }
        if writer.saved_revision != Some(current.revision) {
            warn!(namespace = %self.namespace, revision = current.revision, "dropping unsaved change for the stored day");
        }

        let next = Arc::new(DayState {
            revision: current.revision + 1,
            record: stored.record,
        });
        self.publish(next.clone());
        writer.stored_version = Some(stored.version);
        writer.saved_revision = Some(next.revision);
        info!(namespace = %self.namespace, %date, version = stored.version, revision = next.revision, "picked up day saved by another process");
        Some(if date > active {
            Event::DayRolledOver {
                archived: active,
                started: date,
                at: now,
            }
        } else {
            Event::ScheduleChanged {
                revision: next.revision,
                at: now,
            }
        })
    }

    /// Seal the active day and publish a fresh one once the logical date
    /// has moved forward. The sealed day is queued for archiving.
    fn roll_over(&self, writer: &mut WriterState, now: DateTime<Utc>) -> Option<Event> {
        let current = self.current();
        let today = self.rules.logical_date(now);
        let active = current.record.day.date;
        if today <= active {
            return None;
        }

        writer.unarchived.push(PendingArchive {
            record: DayRecord {
                day: current.record.day.clone().sealed(),
                tracker: current.record.tracker.clone(),
            },
            version: writer.stored_version.take(),
        });
        self.publish(Arc::new(DayState {
            revision: current.revision + 1,
            record: fresh_record(today, &self.rules),
        }));
        info!(namespace = %self.namespace, archived = %active, started = %today, "day rolled over");
        Some(Event::DayRolledOver {
            archived: active,
            started: today,
            at: now,
        })
    }

    /// Write pending archives, then the active day. Must be called with
    /// the writer lock held.
    fn persist(&self, writer: &mut WriterState, now: DateTime<Utc>) -> std::result::Result<(), EngineError> {
        while let Some(pending) = writer.unarchived.first() {
            let date = pending.record.day.date;
            match self.store.archive(self.namespace, &pending.record, pending.version) {
                Ok(()) => info!(namespace = %self.namespace, %date, "archived day"),
                Err(err) if err.is_stale_write() => {
                    debug!(namespace = %self.namespace, %date, "day already archived by another process");
                }
                Err(err) => return Err(self.persistence_failed(err, now)),
            }
            writer.unarchived.remove(0);
        }

        let current = self.current();
        if writer.saved_revision == Some(current.revision) {
            return Ok(());
        }
        match self
            .store
            .save(self.namespace, &current.record, writer.stored_version)
        {
            Ok(version) => {
                writer.stored_version = Some(version);
                writer.saved_revision = Some(current.revision);
                Ok(())
            }
            Err(err) if err.is_stale_write() => {
                warn!(namespace = %self.namespace, revision = current.revision, "day was changed by another process");
                if let Some(event) = self.sync_from_store(writer, now) {
                    self.emit(event);
                }
                Err(EngineError::ConflictingMutation {
                    expected: current.revision,
                    actual: self.current().revision,
                })
            }
            Err(err) => Err(self.persistence_failed(err, now)),
        }
    }

    /// Best-effort [`persist`](Self::persist) for paths that have nothing
    /// else to report.
    fn flush(&self, writer: &mut WriterState, now: DateTime<Utc>) {
        let dirty = !writer.unarchived.is_empty()
            || writer.saved_revision != Some(self.current().revision);
        if !dirty {
            return;
        }
        if let Err(err) = self.persist(writer, now) {
            warn!(namespace = %self.namespace, error = %err, "day not saved; retrying on the next write");
        }
    }

    fn mutate<T>(
        &self,
        expected_revision: Option<u64>,
        apply: impl FnOnce(&mut DayState, DateTime<Utc>) -> std::result::Result<(T, Vec<Event>), EngineError>,
    ) -> std::result::Result<T, EngineError> {
        let mut writer = self.lock_writer();
        let now = self.clock.now();
        if let Some(event) = self.sync_from_store(&mut writer, now) {
            self.emit(event);
        }
        let current = self.current();
        if let Some(expected) = expected_revision {
            if expected != current.revision {
                warn!(namespace = %self.namespace, expected, actual = current.revision, "rejected stale mutation");
                return Err(EngineError::ConflictingMutation {
                    expected,
                    actual: current.revision,
                });
            }
        }
        // A mutation never lands on yesterday's day.
        if let Some(rolled) = self.roll_over(&mut writer, now) {
            self.emit(rolled);
            if let Some(expected) = expected_revision {
                self.flush(&mut writer, now);
                return Err(EngineError::ConflictingMutation {
                    expected,
                    actual: self.current().revision,
                });
            }
        }

        let current = self.current();
        let mut next = (*current).clone();
        let (value, events) = match apply(&mut next, now) {
            Ok(applied) => applied,
            Err(err) => {
                self.flush(&mut writer, now);
                return Err(err);
            }
        };
        if next.record == current.record {
            self.flush(&mut writer, now);
            return Ok(value);
        }
        next.revision = current.revision + 1;
        let next = Arc::new(next);
        self.publish(next.clone());
        debug!(namespace = %self.namespace, revision = next.revision, "published day");

        for event in events {
            self.emit(event);
        }
        self.emit(Event::ScheduleChanged {
            revision: next.revision,
            at: now,
        });
        self.persist(&mut writer, now)?;
        Ok(value)
    }
}

fn fresh_record(date: NaiveDate, rules: &ScheduleRules) -> DayRecord {
    DayRecord {
        day: generate(date, rules),
        tracker: Default::default(),
    }
}

fn evaluated(evaluation: &Evaluation, at: DateTime<Utc>) -> Event {
    Event::IntervalEvaluated {
        interval_id: evaluation.interval_id,
        outcome: evaluation.outcome,
        abandoned: evaluation.abandoned,
        at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::SessionState;
    use crate::storage::InMemoryDayStore;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn options() -> EngineOptions {
        EngineOptions {
            namespace: Namespace::Live,
            rules: ScheduleRules {
                utc_offset_minutes: Some(0),
                ..ScheduleRules::default()
            },
            scoring: ScoringPolicy::default(),
        }
    }

    fn engine_at(now: DateTime<Utc>) -> (DayEngine, ManualClock, Arc<InMemoryDayStore>) {
        let clock = ManualClock::new(now);
        let store = Arc::new(InMemoryDayStore::new());
        let engine = DayEngine::start(Arc::new(clock.clone()), store.clone(), options()).unwrap();
        (engine, clock, store)
    }

    #[test]
    fn start_generates_and_saves_today() {
        let (engine, _, store) = engine_at(at(8, 0));
        let snap = engine.snapshot();
        assert_eq!(snap.revision, 0);
        assert_eq!(snap.day.date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(snap.session.state, SessionState::BeforeDay);
        assert_eq!(store.load(Namespace::Live).unwrap().unwrap().record.day, snap.day);
    }

    #[test]
    fn mutations_bump_revision_and_persist() {
        let (engine, _, store) = engine_at(at(9, 5));
        let intention = engine
            .set_intention(IntervalId(1), "draft", Some(1), Some(0))
            .unwrap();
        assert_eq!(intention.set_at, at(9, 5));
        let snap = engine.snapshot();
        assert_eq!(snap.revision, 1);
        assert_eq!(snap.intention(IntervalId(1)), Some(&intention));
        let saved = store.load(Namespace::Live).unwrap().unwrap();
        assert!(saved.record.tracker.intention(IntervalId(1)).is_some());
    }

    #[test]
    fn stale_revision_is_rejected_without_changes() {
        let (engine, _, _) = engine_at(at(9, 5));
        engine.set_intention(IntervalId(1), "a", None, None).unwrap();
        let before = engine.snapshot();
        let err = engine
            .set_intention(IntervalId(3), "b", None, Some(0))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::ConflictingMutation {
                expected: 0,
                actual: 1
            }
        );
        assert_eq!(engine.snapshot().intentions, before.intentions);
        assert_eq!(engine.revision(), 1);
    }

    #[test]
    fn failed_save_keeps_the_published_change() {
        let (engine, _, store) = engine_at(at(9, 5));
        let mut events = engine.subscribe();
        store.fail_writes(true);
        let err = engine
            .set_intention(IntervalId(1), "a", None, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::PersistenceFailure(_)));
        assert!(engine.snapshot().intention(IntervalId(1)).is_some());

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            saw_failure |= matches!(event, Event::PersistenceFailed { .. });
        }
        assert!(saw_failure);
    }

    #[test]
    fn repeated_abandon_publishes_once() {
        let (engine, clock, _) = engine_at(at(9, 5));
        let first = engine.abandon(IntervalId(1), None).unwrap();
        clock.advance(Duration::minutes(1));
        let second = engine.abandon(IntervalId(1), None).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.revision(), 1);
    }

    #[test]
    fn failed_mutation_leaves_state_untouched() {
        let (engine, _, _) = engine_at(at(9, 5));
        let before = engine.snapshot();
        assert_eq!(
            engine.set_intention(IntervalId(2), "rest", None, None),
            Err(EngineError::NotAFocusInterval(IntervalId(2)))
        );
        assert_eq!(engine.snapshot().revision, before.revision);
    }

    #[test]
    fn bonus_and_remove_change_the_schedule() {
        let (engine, _, _) = engine_at(at(9, 5));
        let bonus = engine.add_bonus_pomodoro(None).unwrap();
        assert_eq!(bonus.start, at(17, 0));
        engine.remove_interval(IntervalId(5), None).unwrap();
        let snap = engine.snapshot();
        assert!(snap.interval(IntervalId(5)).is_none());
        assert_eq!(snap.interval(bonus.id), Some(&bonus));
        assert_eq!(snap.revision, 2);
    }

    #[test]
    fn tick_reports_crossed_boundaries_once() {
        let (engine, clock, _) = engine_at(at(9, 20));
        clock.set(at(9, 26));
        let outcome = engine.tick().unwrap();
        assert_eq!(outcome.at, at(9, 26));
        assert_eq!(outcome.events.len(), 2);
        assert!(matches!(
            outcome.events[0],
            Event::IntervalEnded {
                interval_id: IntervalId(1),
                intention_set: false,
                ..
            }
        ));
        assert!(engine.tick().unwrap().events.is_empty());
    }

    #[test]
    fn tick_rolls_over_and_archives_the_old_day() {
        let (engine, clock, store) = engine_at(at(16, 0));
        engine.set_intention(IntervalId(31), "wrap up", None, None).unwrap();
        clock.set(at(16, 0) + Duration::hours(13));

        let outcome = engine.tick().unwrap();
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, Event::DayRolledOver { .. })));
        let snap = engine.snapshot();
        assert_eq!(snap.day.date, NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        assert!(snap.intentions.is_empty());

        let history = store.history(Namespace::Live).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].day.sealed);
        assert!(history[0].tracker.intention(IntervalId(31)).is_some());
        assert_eq!(engine.history().unwrap()[0].date, history[0].day.date);
    }

    #[test]
    fn rollover_tick_reports_the_old_day_before_the_new_one() {
        let (engine, clock, _) = engine_at(at(16, 50));
        let mut events = engine.subscribe();
        clock.set(at(9, 1) + Duration::days(1));

        let outcome = engine.tick().unwrap();
        let position = |pred: &dyn Fn(&Event) -> bool| outcome.events.iter().position(pred);
        let last_end = position(&|e| {
            matches!(e, Event::IntervalEnded { interval_id: IntervalId(32), .. })
        })
        .unwrap();
        let day_over = position(&|e| matches!(e, Event::DayOver { .. })).unwrap();
        let rolled = position(&|e| matches!(e, Event::DayRolledOver { .. })).unwrap();
        let first_start = position(&|e| {
            matches!(e, Event::IntervalStarted { interval_id: IntervalId(1), .. })
        })
        .unwrap();
        assert!(last_end < day_over);
        assert!(day_over < rolled);
        assert!(rolled < first_start);
        assert!(matches!(
            outcome.events[day_over],
            Event::DayOver { date, .. } if date == NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        ));

        let mut broadcast = Vec::new();
        while let Ok(event) = events.try_recv() {
            broadcast.push(event);
        }
        assert_eq!(broadcast, outcome.events);
    }

    #[test]
    fn rollover_save_failure_still_applies_the_mutation() {
        let (engine, clock, store) = engine_at(at(16, 0));
        clock.set(at(9, 1) + Duration::days(1));
        store.fail_writes(true);

        let err = engine
            .set_intention(IntervalId(1), "fresh start", None, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::PersistenceFailure(_)));
        let snap = engine.snapshot();
        assert_eq!(snap.day.date, NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        assert_eq!(
            snap.intention(IntervalId(1)).map(|i| i.description.as_str()),
            Some("fresh start")
        );

        // The next tick writes the archive and the new day.
        store.fail_writes(false);
        engine.tick().unwrap();
        assert_eq!(store.history(Namespace::Live).unwrap().len(), 1);
        let saved = store.load(Namespace::Live).unwrap().unwrap().record;
        assert!(saved.tracker.intention(IntervalId(1)).is_some());
    }

    #[test]
    fn engines_sharing_a_store_see_each_others_changes() {
        let clock = ManualClock::new(at(9, 5));
        let store = Arc::new(InMemoryDayStore::new());
        let watcher = DayEngine::start(Arc::new(clock.clone()), store.clone(), options()).unwrap();
        let command = DayEngine::start(Arc::new(clock.clone()), store.clone(), options()).unwrap();

        command.set_intention(IntervalId(1), "review", None, None).unwrap();
        let stale = watcher.revision();
        watcher.tick().unwrap();
        assert!(watcher.snapshot().intention(IntervalId(1)).is_some());
        assert!(watcher.revision() > stale);

        // A write based on the watcher's old view lands on top of the
        // command's change instead of replacing it.
        watcher.set_intention(IntervalId(3), "tests", None, None).unwrap();
        let saved = store.load(Namespace::Live).unwrap().unwrap().record;
        assert!(saved.tracker.intention(IntervalId(1)).is_some());
        assert!(saved.tracker.intention(IntervalId(3)).is_some());

        assert!(matches!(
            command.set_intention(IntervalId(5), "docs", None, Some(stale)),
            Err(EngineError::ConflictingMutation { .. })
        ));
    }

    #[test]
    fn mutation_after_midnight_targets_the_new_day() {
        let (engine, clock, _) = engine_at(at(16, 0));
        clock.set(at(9, 1) + Duration::days(1));
        engine.set_intention(IntervalId(1), "fresh start", None, None).unwrap();
        let snap = engine.snapshot();
        assert_eq!(snap.day.date, NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        assert_eq!(snap.intentions.len(), 1);
    }

    #[test]
    fn restart_resumes_the_saved_day() {
        let (engine, clock, store) = engine_at(at(9, 5));
        engine.set_intention(IntervalId(1), "a", None, None).unwrap();
        drop(engine);
        let resumed = DayEngine::start(Arc::new(clock), store, options()).unwrap();
        assert!(resumed.snapshot().intention(IntervalId(1)).is_some());
    }

    #[test]
    fn readers_never_see_partial_updates() {
        let (engine, _, _) = engine_at(at(8, 0));
        let engine = Arc::new(engine);
        let focus_ids: Vec<IntervalId> = engine
            .snapshot()
            .day
            .focus_intervals()
            .map(|i| i.id)
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    let mut last = 0;
                    for _ in 0..500 {
                        let snap = engine.snapshot();
                        assert_eq!(snap.intentions.len() as u64, snap.revision);
                        assert!(snap.revision >= last);
                        last = snap.revision;
                    }
                })
            })
            .collect();

        for id in focus_ids {
            engine.set_intention(id, "plan", None, None).unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(engine.revision(), 16);
    }
}
