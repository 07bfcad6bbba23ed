//! DayStore in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use chrono::NaiveDate;

use super::{stale_write, DayRecord, DayStore, Namespace, StoredDay};
use crate::error::{CoreError, DatabaseError, Result};

#[derive(Debug, Clone)]
struct Row {
    record: DayRecord,
    archived: bool,
    version: u64,
}

/// In-memory implementation for development and testing.
#[derive(Default)]
pub struct InMemoryDayStore {
    days: RwLock<HashMap<(Namespace, NaiveDate), Row>>,
    fail_writes: AtomicBool,
}

impl InMemoryDayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save/archive fail, to exercise error paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryFailed("writes disabled".into()).into());
        }
        Ok(())
    }

    fn write(
        &self,
        namespace: Namespace,
        record: &DayRecord,
        archived: bool,
        expected: Option<u64>,
    ) -> Result<u64> {
        self.check_writable()?;
        let mut days = self
            .days
            .write()
            .map_err(|e| CoreError::Custom(e.to_string()))?;
        let key = (namespace, record.day.date);
        let version = match (days.get(&key), expected) {
            (None, None) => 1,
            (Some(row), Some(version)) if !row.archived && row.version == version => version + 1,
            _ => return Err(stale_write(namespace, record)),
        };
        days.insert(
            key,
            Row {
                record: record.clone(),
                archived,
                version,
            },
        );
        Ok(version)
    }
}

impl DayStore for InMemoryDayStore {
    fn load(&self, namespace: Namespace) -> Result<Option<StoredDay>> {
        let days = self
            .days
            .read()
            .map_err(|e| CoreError::Custom(e.to_string()))?;
        Ok(days
            .iter()
            .filter(|((ns, _), row)| *ns == namespace && !row.archived)
            .max_by_key(|((_, date), _)| *date)
            .map(|(_, row)| StoredDay {
                version: row.version,
                record: row.record.clone(),
            }))
    }

    fn save(&self, namespace: Namespace, record: &DayRecord, expected: Option<u64>) -> Result<u64> {
        self.write(namespace, record, false, expected)
    }

    fn archive(&self, namespace: Namespace, record: &DayRecord, expected: Option<u64>) -> Result<()> {
        self.write(namespace, record, true, expected).map(|_| ())
    }

    fn history(&self, namespace: Namespace) -> Result<Vec<DayRecord>> {
        let days = self
            .days
            .read()
            .map_err(|e| CoreError::Custom(e.to_string()))?;
        let mut archived: Vec<DayRecord> = days
            .iter()
            .filter(|((ns, _), row)| *ns == namespace && row.archived)
            .map(|(_, row)| row.record.clone())
            .collect();
        archived.sort_by(|a, b| b.day.date.cmp(&a.day.date));
        Ok(archived)
    }
}
