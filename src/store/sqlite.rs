//! SQLite-backed raw store reader
//!
//! The upstream tool persists its cache as a SQLite file whose tables carry
//! unstable hash-like names; the `value` column holds either JSON text or a
//! binary blob. This reader is strictly read-only.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{types::ValueRef, Connection, OpenFlags};
use serde_json::Value;

use super::{decode_lossy, RawRecord, RawStore, RecordIter};
use crate::{Error, Result};

#[derive(Debug)]
pub struct SqliteRawStore {
    /// rusqlite connections are `Send` but not `Sync`; serialized access
    /// keeps the store shareable behind the cache.
    conn: Mutex<Connection>,
    db_path: PathBuf,
    /// Sidecar directory for large values. The snapshotting tool inlines
    /// everything this reader consumes, so the path is only recorded.
    #[allow(dead_code)]
    blob_path: Option<PathBuf>,
}

impl SqliteRawStore {
    /// Open the cache database read-only.
    ///
    /// A missing file is a [`Error::StoreNotFound`], not an empty store:
    /// callers rely on the distinction.
    pub fn open(db_path: &Path, blob_path: Option<&Path>) -> Result<Self> {
        if !db_path.exists() {
            return Err(Error::StoreNotFound(db_path.display().to_string()));
        }
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
            blob_path: blob_path.map(Path::to_path_buf),
        })
    }

    fn value_from_column(raw: ValueRef<'_>) -> Value {
        let text = match raw {
            ValueRef::Null => return Value::Null,
            ValueRef::Integer(n) => return Value::from(n),
            ValueRef::Real(f) => return Value::from(f),
            ValueRef::Text(bytes) => decode_lossy(bytes),
            ValueRef::Blob(bytes) => decode_lossy(bytes),
        };
        // Structured records are JSON text; anything else stays a string.
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    }
}

impl RawStore for SqliteRawStore {
    fn table_names(&self) -> Result<Vec<String>> {
        // The file can disappear between reloads; re-check so the cache can
        // surface not-found rather than a confusing low-level error.
        if !self.db_path.exists() {
            return Err(Error::StoreNotFound(self.db_path.display().to_string()));
        }
        let conn = self.conn.lock().expect("connection lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(names)
    }

    fn iter_records(&self, table: &str) -> Result<RecordIter<'_>> {
        // Table names are attacker-free but not identifier-safe; quote them.
        let quoted = table.replace('"', "\"\"");
        let conn = self.conn.lock().expect("connection lock poisoned");
        let mut stmt = conn.prepare(&format!("SELECT key, value FROM \"{quoted}\""))?;

        let mut records: Vec<Result<RawRecord>> = Vec::new();
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let value = Self::value_from_column(row.get_ref(1)?);
            Ok(RawRecord { key, value })
        })?;
        for row in rows {
            match row {
                Ok(record) => records.push(Ok(record)),
                Err(e) => {
                    // Remaining rows are unreadable; surface one Err and stop.
                    records.push(Err(e.into()));
                    break;
                }
            }
        }
        Ok(Box::new(records.into_iter()))
    }
}
