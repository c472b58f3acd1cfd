//! Snapshot construction and lifecycle
//!
//! [`loader::SnapshotLoader`] turns detected tables into a fully populated
//! [`crate::model::Snapshot`]; [`cache::SnapshotCache`] owns the current
//! snapshot and decides when to rebuild it.

pub mod cache;
pub mod loader;

pub use cache::SnapshotCache;
pub use loader::SnapshotLoader;

/// Current wall-clock time as fractional epoch seconds.
pub(crate) fn epoch_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
