//! TTL-gated snapshot cache
//!
//! Owns the current [`Snapshot`] behind an atomically swapped `Arc`, so a
//! reader always sees a fully-old or fully-new snapshot and never a partial
//! one. Reloads are coalesced: concurrent callers that find the snapshot
//! stale wait on the single in-flight rebuild instead of duplicating it.
//! Table-role detection runs at most once per process; the upstream table
//! naming is stable for a process lifetime.

use std::sync::{Arc, Mutex, OnceLock, RwLock};

use super::{epoch_now, SnapshotLoader};
use crate::model::Snapshot;
use crate::store::{detect_tables, DetectedTables, RawStore};
use crate::Result;

pub struct SnapshotCache {
    store: Box<dyn RawStore>,
    current: RwLock<Arc<Snapshot>>,
    reload_lock: Mutex<()>,
    detected: OnceLock<DetectedTables>,
    ttl: f64,
}

impl SnapshotCache {
    pub fn new(store: Box<dyn RawStore>) -> Self {
        Self::with_ttl(store, crate::model::CACHE_TTL_SECONDS)
    }

    /// Cache with a non-default TTL, in seconds.
    pub fn with_ttl(store: Box<dyn RawStore>, ttl: f64) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(Snapshot::default())),
            reload_lock: Mutex::new(()),
            detected: OnceLock::new(),
            ttl,
        }
    }

    /// The current snapshot, reloading first if it is stale.
    ///
    /// Staleness means the TTL elapsed or nothing was ever loaded. On
    /// reload failure the previous snapshot is left in place and the error
    /// (notably [`crate::Error::StoreNotFound`]) propagates to the caller.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        if let Some(fresh) = self.fresh_snapshot() {
            return Ok(fresh);
        }

        let _reload = self.reload_lock.lock().expect("reload lock poisoned");
        // A concurrent caller may have finished the reload while we waited.
        if let Some(fresh) = self.fresh_snapshot() {
            return Ok(fresh);
        }

        let tables = self.detect_once()?;
        let snapshot = Arc::new(SnapshotLoader::new(self.store.as_ref(), tables).load()?);
        *self.current.write().expect("snapshot lock poisoned") = Arc::clone(&snapshot);
        Ok(snapshot)
    }

    /// The detected table-role mapping, computing it on first use.
    pub fn tables(&self) -> Result<&DetectedTables> {
        if let Some(tables) = self.detected.get() {
            return Ok(tables);
        }
        let _reload = self.reload_lock.lock().expect("reload lock poisoned");
        self.detect_once()
    }

    /// Detection body; the caller must hold `reload_lock` so concurrent
    /// entrants cannot each run a scan.
    fn detect_once(&self) -> Result<&DetectedTables> {
        if self.detected.get().is_none() {
            let tables = detect_tables(self.store.as_ref())?;
            let _ = self.detected.set(tables);
        }
        Ok(self.detected.get().expect("detection result just stored"))
    }

    fn fresh_snapshot(&self) -> Option<Arc<Snapshot>> {
        let current = self.current.read().expect("snapshot lock poisoned");
        if current.is_stale_after(epoch_now(), self.ttl) {
            None
        } else {
            Some(Arc::clone(&current))
        }
    }
}
