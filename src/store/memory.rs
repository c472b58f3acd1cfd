//! In-memory raw store for tests and fixtures
//!
//! Mirrors the table/record shape of the on-disk reader and can inject the
//! failure modes the loader has to survive: an unreadable table tail and a
//! store whose backing path has disappeared.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{RawRecord, RawStore, RecordIter};
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Vec<RawRecord>>,
    /// table name -> record count after which iteration fails
    poisoned: BTreeMap<String, usize>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose backing path is absent: every access reports not-found.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Add a table of records keyed by their position.
    pub fn with_table(mut self, name: &str, values: Vec<Value>) -> Self {
        let records = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| RawRecord::new(format!("{name}:{i}"), value))
            .collect();
        self.tables.insert(name.to_string(), records);
        self
    }

    /// Make iteration over `name` fail after yielding `after` records.
    pub fn poisoned_after(mut self, name: &str, after: usize) -> Self {
        self.poisoned.insert(name.to_string(), after);
        self
    }
}

impl RawStore for MemoryStore {
    fn table_names(&self) -> Result<Vec<String>> {
        if self.unavailable {
            return Err(Error::StoreNotFound("(in-memory)".to_string()));
        }
        Ok(self.tables.keys().cloned().collect())
    }

    fn iter_records(&self, table: &str) -> Result<RecordIter<'_>> {
        if self.unavailable {
            return Err(Error::StoreNotFound("(in-memory)".to_string()));
        }
        let records = self.tables.get(table).cloned().unwrap_or_default();
        let fail_after = self.poisoned.get(table).copied();
        let table = table.to_string();

        let iter = records
            .into_iter()
            .map(Ok)
            .enumerate()
            .map(move |(i, record)| {
                if Some(i) == fail_after {
                    Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("table {table} unreadable"),
                    )))
                } else {
                    record
                }
            });
        Ok(Box::new(iter))
    }
}
