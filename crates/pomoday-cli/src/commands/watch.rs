//! `pomoday watch`: run the ticker and print what happens.

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use pomoday_core::{DayEngine, Event, IntervalKind, Ticker};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::day::status_line;
use super::{hhmm, open_engine, CliResult};

pub fn run(test_mode: bool, json: bool) -> CliResult {
    let (engine, config) = open_engine(test_mode)?;
    let period = Duration::from_millis(config.engine.tick_millis);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(watch(engine, period, json))
}

async fn watch(engine: Arc<DayEngine>, period: Duration, json: bool) -> CliResult {
    let offset = engine.rules().offset();
    let mut events = engine.subscribe();
    let ticker = Ticker::spawn(engine.clone(), period);
    let cancel: CancellationToken = ticker.cancel_token();

    if !json {
        println!("{}", status_line(&engine.snapshot(), offset));
    }
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = cancel.cancelled() => break,
            received = events.recv() => match received {
                Ok(event) => print_event(&engine, &event, json, offset)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "watch fell behind the event stream"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    ticker.stop().await?;
    Ok(())
}

fn print_event(engine: &DayEngine, event: &Event, json: bool, offset: FixedOffset) -> CliResult {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        Event::IntervalStarted { interval_id, kind, at } => {
            let kind = match kind {
                IntervalKind::Focus => "focus",
                IntervalKind::Break => "break",
            };
            println!("{} {interval_id} {kind} started", hhmm(*at, offset));
            println!("{}", status_line(&engine.snapshot(), offset));
        }
        Event::IntervalEnded {
            interval_id,
            kind: IntervalKind::Focus,
            intention_set: false,
            at,
        } => {
            println!("{} {interval_id} ended with no intention", hhmm(*at, offset));
        }
        Event::IntervalEnded {
            interval_id,
            kind: IntervalKind::Focus,
            at,
            ..
        } => {
            println!(
                "{} {interval_id} ended; evaluate it with `pomoday evaluate {}`",
                hhmm(*at, offset),
                interval_id.0
            );
        }
        Event::DayOver { date, at } => {
            println!("{} {date} is over  {}", hhmm(*at, offset), engine.snapshot().label);
        }
        Event::DayRolledOver { started, .. } => {
            println!("new day {started}");
            println!("{}", status_line(&engine.snapshot(), offset));
        }
        Event::PersistenceFailed { message, .. } => {
            eprintln!("warning: could not save the day: {message}");
        }
        _ => {}
    }
    Ok(())
}
