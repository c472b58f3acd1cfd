//! Raw store access
//!
//! The tracker's local cache is an opaque collection of tables with
//! hash-like names, each holding key/value records. [`RawStore`] is the
//! seam the detection and loading layers work against; [`SqliteRawStore`]
//! is the on-disk implementation and [`MemoryStore`] the in-memory one
//! used by tests and fixtures.

use serde_json::Value;

use crate::Result;

pub mod detect;
pub mod memory;
pub mod sqlite;

pub use detect::{detect_tables, DetectedTables};
pub use memory::MemoryStore;
pub use sqlite::SqliteRawStore;

/// One raw key/value record from an underlying table.
///
/// Values are always surfaced as JSON: structured records as objects,
/// byte/string blobs as (best-effort decoded) strings.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub key: String,
    pub value: Value,
}

impl RawRecord {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Iterator over the records of one table. A mid-stream `Err` means the
/// rest of the table is unreadable; consumers abandon the table and move on.
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<RawRecord>> + 'a>;

/// Read access to the raw table/record layer of the tracker cache.
///
/// `Send + Sync` so one store can sit behind the shared snapshot cache.
pub trait RawStore: Send + Sync {
    /// Enumerate physical table names.
    ///
    /// Returns [`crate::Error::StoreNotFound`] when the backing path is
    /// absent, which callers must distinguish from an empty store.
    fn table_names(&self) -> Result<Vec<String>>;

    /// Iterate the records of one table.
    fn iter_records(&self, table: &str) -> Result<RecordIter<'_>>;
}

/// Decode a raw byte value to text, replacing invalid sequences.
pub(crate) fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
