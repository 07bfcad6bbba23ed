mod config;
pub mod database;
mod memory;

pub use config::{Config, EngineConfig, TestModeConfig};
pub use database::SqliteDayStore;
pub use memory::InMemoryDayStore;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CoreError, DatabaseError, Result};
use crate::intention::IntentionTracker;
use crate::schedule::Day;

/// Returns `~/.config/pomoday/`, or `POMODAY_DATA_DIR` when set.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("POMODAY_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .ok_or_else(|| ConfigError::DataDir("no home directory".into()))?
            .join(".config")
            .join("pomoday"),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Isolation boundary between the real day and accelerated test runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Live,
    Test,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Live => "live",
            Namespace::Test => "test",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "live" => Ok(Namespace::Live),
            "test" => Ok(Namespace::Test),
            other => Err(ConfigError::InvalidValue {
                key: "namespace".into(),
                message: format!("expected 'live' or 'test', got '{other}'"),
            }),
        }
    }
}

/// Everything persisted for one day: the schedule plus all intentions and
/// evaluations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub day: Day,
    #[serde(default)]
    pub tracker: IntentionTracker,
}

/// A stored day together with its row version.
///
/// The version goes up by one on every write, whoever makes it. Writers
/// pass back the version they last saw so a write that raced another
/// process fails instead of overwriting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDay {
    pub version: u64,
    pub record: DayRecord,
}

/// Persistence for the active day and the archive of past days.
///
/// `save` and `archive` are compare-and-swap writes. `expected` is the
/// version the caller last read for that date, or `None` when the caller
/// believes no row exists yet. A mismatch fails with
/// [`DatabaseError::StaleWrite`](crate::error::DatabaseError::StaleWrite)
/// and leaves the stored row alone.
pub trait DayStore: Send + Sync {
    /// The active (not archived) day, if any.
    fn load(&self, namespace: Namespace) -> Result<Option<StoredDay>>;

    /// Write the active day and return its new version.
    fn save(&self, namespace: Namespace, record: &DayRecord, expected: Option<u64>) -> Result<u64>;

    /// Move a day into the read-only archive.
    fn archive(&self, namespace: Namespace, record: &DayRecord, expected: Option<u64>) -> Result<()>;

    /// Archived days, newest first.
    fn history(&self, namespace: Namespace) -> Result<Vec<DayRecord>>;
}

fn stale_write(namespace: Namespace, record: &DayRecord) -> CoreError {
    DatabaseError::StaleWrite {
        namespace: namespace.to_string(),
        date: record.day.date.to_string(),
    }
    .into()
}
