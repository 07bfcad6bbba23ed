//! # Pomoday Core Library
//!
//! This library provides the engine behind `pomoday`, a perpetual day
//! scheduler for focus intervals. The day's schedule exists and advances with
//! the clock whether or not anyone is watching; the user attaches intentions
//! to focus intervals, evaluates them once they end, and sees a running score.
//!
//! ## Architecture
//!
//! - **Clock**: every reading of "now" goes through a [`Clock`], real or
//!   accelerated for test runs
//! - **Schedule**: a [`Day`] of focus/break intervals generated from
//!   [`ScheduleRules`], edited only through pure functions
//! - **Session / Scoring**: views derived on demand from the day and the
//!   clock, never stored
//! - **Engine**: [`DayEngine`] owns the published snapshot, serialises
//!   mutations and rolls the day over
//! - **Storage**: SQLite day records per namespace and TOML configuration
//!
//! ## Key Components
//!
//! - [`DayEngine`]: Presentation API (snapshots, mutations, ticks, events)
//! - [`Ticker`]: Cancelable periodic driver for the engine
//! - [`SqliteDayStore`]: Day persistence and archive
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod intention;
pub mod schedule;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod ticker;

pub use clock::{AcceleratedClock, AcceleratedConfig, Clock, ManualClock, RealClock};
pub use engine::{DayEngine, DaySummary, EngineOptions, EngineSnapshot, TickOutcome};
pub use error::{ConfigError, CoreError, DatabaseError, EngineError, ValidationError};
pub use events::Event;
pub use intention::{Evaluation, Intention, IntentionTracker, Outcome};
pub use schedule::{Day, Interval, IntervalBounds, IntervalId, IntervalKind, ScheduleRules};
pub use scoring::{ScoreSnapshot, ScoringPolicy};
pub use session::{SessionState, SessionView};
pub use storage::{
    Config, DayRecord, DayStore, InMemoryDayStore, Namespace, SqliteDayStore, StoredDay,
};
pub use ticker::Ticker;
