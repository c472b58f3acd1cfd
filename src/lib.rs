//! # Issuelens - Local Project-Tracker Mirror
//!
//! Fast, read-only access to a project tracker's locally cached data
//! (teams, users, workflow states, issues, comments) without network calls.
//!
//! Issuelens provides:
//! - Structural detection of which opaque cache tables hold which entity kind
//! - A snapshot loader that normalizes raw records into an entity graph
//! - A TTL-gated, atomically swapped in-memory snapshot cache
//! - A query engine with fuzzy matching, filtering and keyset pagination
//! - An MCP stdio server exposing the query operations as tools

pub mod config;
pub mod model;
pub mod query;
pub mod richtext;
pub mod server;
pub mod snapshot;
pub mod store;

// Re-exports for convenient access
pub use model::{Comment, Issue, Snapshot, Team, User, WorkflowState};
pub use query::QueryEngine;
pub use snapshot::SnapshotCache;
pub use store::{RawRecord, RawStore, SqliteRawStore};

/// Result type alias for Issuelens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Issuelens operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing cache database does not exist at the configured path.
    /// Distinct from a database that is present but holds no records.
    #[error("Tracker cache not found: {0}")]
    StoreNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-supplied input failed validation (e.g. an unparsable date
    /// filter). Surfaced to clients as a structured error value.
    #[error("{0}")]
    Validation(String),

    /// The primary subject of an operation does not exist (e.g. the user
    /// named in a my-issues request).
    #[error("{0}")]
    NotFound(String),
}
