//! One-shot commands against the current day.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use clap::ValueEnum;
use pomoday_core::{
    EngineSnapshot, IntervalBounds, IntervalId, IntervalKind, Namespace, Outcome, SessionState,
};
use serde::Serialize;

use super::{hhmm, open_engine, CliResult};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Verdict {
    Success,
    Distracted,
}

impl From<Verdict> for Outcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Success => Outcome::Success,
            Verdict::Distracted => Outcome::Distracted,
        }
    }
}

/// One line of `pomoday list`.
#[derive(Debug, Serialize)]
struct IntervalRow {
    id: IntervalId,
    kind: IntervalKind,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    current: bool,
    intention: Option<String>,
    estimated_pomodoros: Option<u32>,
    outcome: Option<Outcome>,
    abandoned: bool,
}

fn rows(snap: &EngineSnapshot) -> Vec<IntervalRow> {
    snap.day
        .intervals
        .iter()
        .map(|interval| {
            let intention = snap.intention(interval.id);
            let evaluation = snap.evaluation(interval.id);
            IntervalRow {
                id: interval.id,
                kind: interval.kind,
                start: interval.start,
                end: interval.end,
                current: interval.contains(snap.at),
                intention: intention.map(|i| i.description.clone()),
                estimated_pomodoros: intention.and_then(|i| i.estimated_pomodoros),
                outcome: interval.is_focus().then(|| snap.outcome(interval.id)),
                abandoned: evaluation.is_some_and(|e| e.abandoned),
            }
        })
        .collect()
}

pub fn status_line(snap: &EngineSnapshot, offset: FixedOffset) -> String {
    let mut parts = Vec::new();
    if snap.namespace == Namespace::Test {
        parts.push(format!("[test {}]", hhmm(snap.at, offset)));
    }
    parts.push(snap.label.clone());

    let session = &snap.session;
    match (session.state, &session.interval) {
        (SessionState::BeforeDay, _) => {
            parts.push(format!("day starts {}", hhmm(snap.day.base_day_start, offset)));
        }
        (SessionState::AfterDay, _) => parts.push("day over".into()),
        (state, Some(interval)) => {
            let kind = if state == SessionState::InFocusInterval {
                "focus"
            } else {
                "break"
            };
            parts.push(format!(
                "{} {kind} {}-{} {:.0}%",
                interval.id,
                hhmm(interval.start, offset),
                hhmm(interval.end, offset),
                session.progress_fraction * 100.0
            ));
            if let Some(intention) = snap.intention(interval.id) {
                parts.push(format!("\"{}\"", intention.description));
            }
        }
        (_, None) => {}
    }
    if session.overdue && session.state != SessionState::AfterDay {
        parts.push("(between intervals)".into());
    }
    if session.in_grace {
        parts.push("set an intention!".into());
    }
    parts.join("  ")
}

/// The running focus interval, or failing that the next one to start.
fn target_focus(snap: &EngineSnapshot) -> Option<IntervalId> {
    snap.day
        .focus_intervals()
        .find(|i| !i.has_ended(snap.at))
        .map(|i| i.id)
}

fn outcome_mark(row: &IntervalRow, now: DateTime<Utc>) -> &'static str {
    match row.outcome {
        Some(Outcome::Success) => "✓",
        Some(Outcome::Distracted) => "✗",
        Some(Outcome::Unevaluated) if row.end <= now => "?",
        _ => " ",
    }
}

pub fn status(test_mode: bool, json: bool) -> CliResult {
    let (engine, _) = open_engine(test_mode)?;
    let snap = engine.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    } else {
        println!("{}", status_line(&snap, engine.rules().offset()));
    }
    Ok(())
}

pub fn list(test_mode: bool, json: bool) -> CliResult {
    let (engine, _) = open_engine(test_mode)?;
    let snap = engine.snapshot();
    let rows = rows(&snap);
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let offset = engine.rules().offset();
    println!("{}  {}", snap.day.date, snap.label);
    for row in &rows {
        let kind = match row.kind {
            IntervalKind::Focus => "focus",
            IntervalKind::Break => "break",
        };
        let mut line = format!(
            "{} {:>4} {kind:<5} {}-{} {}",
            if row.current { ">" } else { " " },
            row.id.to_string(),
            hhmm(row.start, offset),
            hhmm(row.end, offset),
            outcome_mark(row, snap.at),
        );
        if let Some(intention) = &row.intention {
            line.push(' ');
            line.push_str(intention);
            if let Some(estimate) = row.estimated_pomodoros {
                line.push_str(&format!(" ({estimate}🍅)"));
            }
        }
        if row.abandoned {
            line.push_str(" [abandoned]");
        }
        println!("{line}");
    }
    Ok(())
}

pub fn intend(
    test_mode: bool,
    id: Option<u32>,
    description: &str,
    estimate: Option<u32>,
) -> CliResult {
    let (engine, _) = open_engine(test_mode)?;
    let snap = engine.snapshot();
    let id = match id {
        Some(id) => IntervalId(id),
        None => target_focus(&snap).ok_or("no focus interval left today; pass --id")?,
    };
    let intention = engine.set_intention(id, description, estimate, Some(snap.revision))?;
    println!("{id} {}", intention.description);
    Ok(())
}

pub fn evaluate(test_mode: bool, id: u32, verdict: Verdict) -> CliResult {
    let (engine, _) = open_engine(test_mode)?;
    let evaluation = engine.evaluate(IntervalId(id), verdict.into(), None)?;
    println!("{} {:?}", evaluation.interval_id, evaluation.outcome);
    Ok(())
}

pub fn revise(test_mode: bool, id: u32, verdict: Verdict) -> CliResult {
    let (engine, _) = open_engine(test_mode)?;
    let evaluation = engine.revise(IntervalId(id), verdict.into(), None)?;
    println!(
        "{} {:?} (was {:?})",
        evaluation.interval_id,
        evaluation.outcome,
        evaluation.revisions.last().map(|r| r.previous).unwrap_or_default()
    );
    Ok(())
}

pub fn abandon(test_mode: bool, id: Option<u32>) -> CliResult {
    let (engine, _) = open_engine(test_mode)?;
    let snap = engine.snapshot();
    let id = match id {
        Some(id) => IntervalId(id),
        None => snap
            .session
            .interval
            .as_ref()
            .filter(|i| i.is_focus() && i.contains(snap.at))
            .map(|i| i.id)
            .ok_or("no focus interval is running")?,
    };
    let evaluation = engine.abandon(id, Some(snap.revision))?;
    println!("{} abandoned", evaluation.interval_id);
    Ok(())
}

fn parse_time(raw: &str) -> CliResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|e| format!("invalid time '{raw}' (expected HH:MM): {e}").into())
}

/// Resolve an HH:MM on the day being shown; times before the day's start
/// belong to the following calendar day.
fn on_day(snap: &EngineSnapshot, offset: FixedOffset, time: NaiveTime) -> CliResult<DateTime<Utc>> {
    let local = offset
        .from_local_datetime(&snap.day.date.and_time(time))
        .single()
        .ok_or_else(|| format!("{time} does not exist on {}", snap.day.date))?;
    let mut at = local.with_timezone(&Utc);
    if at < snap.day.base_day_start {
        at = at + Duration::days(1);
    }
    Ok(at)
}

pub fn edit(test_mode: bool, id: u32, start: &str, end: &str) -> CliResult {
    let (engine, _) = open_engine(test_mode)?;
    let snap = engine.snapshot();
    let offset = engine.rules().offset();
    let bounds = IntervalBounds {
        start: on_day(&snap, offset, parse_time(start)?)?,
        end: on_day(&snap, offset, parse_time(end)?)?,
    };
    let interval = engine.edit_interval(IntervalId(id), bounds, Some(snap.revision))?;
    println!(
        "{} {}-{}",
        interval.id,
        hhmm(interval.start, offset),
        hhmm(interval.end, offset)
    );
    Ok(())
}

pub fn bonus(test_mode: bool) -> CliResult {
    let (engine, _) = open_engine(test_mode)?;
    let interval = engine.add_bonus_pomodoro(None)?;
    let offset = engine.rules().offset();
    println!(
        "added {} {}-{}",
        interval.id,
        hhmm(interval.start, offset),
        hhmm(interval.end, offset)
    );
    Ok(())
}

pub fn remove(test_mode: bool, id: u32) -> CliResult {
    let (engine, _) = open_engine(test_mode)?;
    engine.remove_interval(IntervalId(id), None)?;
    println!("removed {}", IntervalId(id));
    Ok(())
}

pub fn history(test_mode: bool, json: bool) -> CliResult {
    let (engine, _) = open_engine(test_mode)?;
    let days = engine.history()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&days)?);
        return Ok(());
    }
    if days.is_empty() {
        println!("no archived days");
    }
    for day in days {
        println!("{}  {}", day.date, day.label);
    }
    Ok(())
}
