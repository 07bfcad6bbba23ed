//! SQLite-backed day storage.
//!
//! Provides persistent storage for:
//! - The active day per namespace (schedule, intentions, evaluations)
//! - Archived days for history display
//! - A per-namespace key-value store for small process state

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, stale_write, DayRecord, DayStore, Namespace, StoredDay};
use crate::error::{CoreError, DatabaseError, Result};

/// SQLite database holding one row per (namespace, date).
pub struct SqliteDayStore {
    conn: Mutex<Connection>,
}

impl SqliteDayStore {
    /// Open the database at `~/.config/pomoday/pomoday.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join("pomoday.db"))
    }

    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(Duration::from_secs(2))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Custom(e.to_string()))?;
        Ok(f(&conn)?)
    }

    /// Conditional write of one day row.
    ///
    /// With `expected` set, only an active row at that version is replaced.
    /// Without it, the row must not exist yet. Returns the new version.
    fn write(
        &self,
        namespace: Namespace,
        record: &DayRecord,
        archived: bool,
        expected: Option<u64>,
    ) -> Result<u64> {
        let payload = serde_json::to_string(record)?;
        let date = record.day.date.to_string();
        let changed = self.with_conn(|conn| match expected {
            Some(version) => conn.execute(
                "UPDATE days SET archived = ?3, payload = ?4, version = version + 1
                 WHERE namespace = ?1 AND date = ?2 AND archived = 0 AND version = ?5",
                params![namespace.as_str(), date, archived, payload, version as i64],
            ),
            None => conn.execute(
                "INSERT INTO days (namespace, date, archived, version, payload)
                 VALUES (?1, ?2, ?3, 1, ?4)
                 ON CONFLICT(namespace, date) DO NOTHING",
                params![namespace.as_str(), date, archived, payload],
            ),
        })?;
        if changed == 0 {
            return Err(stale_write(namespace, record));
        }
        Ok(expected.map_or(1, |version| version + 1))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, namespace: Namespace, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                params![namespace.as_str(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, namespace: Namespace, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (namespace, key, value) VALUES (?1, ?2, ?3)",
                params![namespace.as_str(), key, value],
            )
            .map(|_| ())
        })
    }
}

fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS days (
            namespace TEXT NOT NULL,
            date      TEXT NOT NULL,
            archived  INTEGER NOT NULL DEFAULT 0,
            version   INTEGER NOT NULL DEFAULT 0,
            payload   TEXT NOT NULL,
            PRIMARY KEY (namespace, date)
        );

        CREATE TABLE IF NOT EXISTS kv (
            namespace TEXT NOT NULL,
            key       TEXT NOT NULL,
            value     TEXT NOT NULL,
            PRIMARY KEY (namespace, key)
        );

        CREATE INDEX IF NOT EXISTS idx_days_namespace_archived_date
            ON days(namespace, archived, date);",
    )
}

fn decode(namespace: Namespace, date: &str, payload: &str) -> Result<DayRecord> {
    serde_json::from_str(payload).map_err(|e| {
        DatabaseError::CorruptRecord {
            namespace: namespace.to_string(),
            date: date.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

impl DayStore for SqliteDayStore {
    fn load(&self, namespace: Namespace) -> Result<Option<StoredDay>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT date, version, payload FROM days
                 WHERE namespace = ?1 AND archived = 0
                 ORDER BY date DESC
                 LIMIT 1",
                params![namespace.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
        })?;
        row.map(|(date, version, payload)| {
            Ok(StoredDay {
                version: version.max(0) as u64,
                record: decode(namespace, &date, &payload)?,
            })
        })
        .transpose()
    }

    fn save(&self, namespace: Namespace, record: &DayRecord, expected: Option<u64>) -> Result<u64> {
        self.write(namespace, record, false, expected)
    }

    fn archive(&self, namespace: Namespace, record: &DayRecord, expected: Option<u64>) -> Result<()> {
        self.write(namespace, record, true, expected).map(|_| ())
    }

    fn history(&self, namespace: Namespace) -> Result<Vec<DayRecord>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT date, payload FROM days
                 WHERE namespace = ?1 AND archived = 1
                 ORDER BY date DESC",
            )?;
            let rows = stmt.query_map(params![namespace.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        rows.iter()
            .map(|(date, payload)| decode(namespace, date, payload))
            .collect()
    }
}
