//! Core error types for pomoday-core.
//!
//! Storage and configuration failures use [`CoreError`] and its sub-enums.
//! Everything the presentation layer can trigger through the engine comes
//! back as an [`EngineError`], which is always recoverable.

use std::path::PathBuf;
use thiserror::Error;

use crate::schedule::IntervalId;

/// Core error type for pomoday-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored payload could not be decoded
    #[error("Corrupt record for {namespace}/{date}: {message}")]
    CorruptRecord {
        namespace: String,
        date: String,
        message: String,
    },

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Another writer changed the row since it was last read
    #[error("Day {namespace}/{date} was changed by another writer")]
    StaleWrite { namespace: String, date: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home or data directory could not be resolved
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Failures returned by the engine's mutation entry points.
///
/// None of these are fatal; the caller shows the message and keeps going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid schedule edit for interval {interval}: {reason}")]
    InvalidScheduleEdit { interval: IntervalId, reason: String },

    #[error("Interval {0} is locked and can no longer be changed")]
    IntervalLocked(IntervalId),

    #[error("Interval {0} is a break; intentions belong to focus intervals")]
    NotAFocusInterval(IntervalId),

    #[error("Interval {0} has already ended")]
    IntervalAlreadyEnded(IntervalId),

    #[error("Interval {0} has no intention to evaluate")]
    NoIntentionSet(IntervalId),

    #[error("Interval {0} has already been evaluated; use revise to change it")]
    AlreadyEvaluated(IntervalId),

    #[error("Interval {0} has not ended yet")]
    EvaluationTooEarly(IntervalId),

    #[error("No interval {0} in the current day")]
    UnknownInterval(IntervalId),

    #[error("Snapshot revision {expected} is stale (current is {actual}); re-read and retry")]
    ConflictingMutation { expected: u64, actual: u64 },

    /// The mutation was applied in memory but could not be written to disk.
    #[error("Change applied but not saved: {0}")]
    PersistenceFailure(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True when a conditional write lost to another writer.
    pub fn is_stale_write(&self) -> bool {
        matches!(self, CoreError::Database(DatabaseError::StaleWrite { .. }))
    }
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        EngineError::PersistenceFailure(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
