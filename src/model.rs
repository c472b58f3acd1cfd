//! Entity types - the normalized in-memory shape of the tracker's data
//!
//! The upstream cache stores loosely structured records; loading normalizes
//! them into these five entity types plus the [`Snapshot`] bundle that holds
//! them. Field names serialize in camelCase so query results match the wire
//! shapes the upstream tool uses.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// How long a loaded snapshot stays fresh before a reload is triggered.
pub const CACHE_TTL_SECONDS: f64 = 300.0;

/// The five workflow state categories the tracker recognizes.
pub const STATE_TYPES: [&str; 5] = ["backlog", "unstarted", "started", "completed", "canceled"];

/// A team, identified by a short uppercase key like "ENG".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub id: String,
    pub name: String,
    /// One of [`STATE_TYPES`], kept as text because unknown values must
    /// survive a round trip unchanged.
    #[serde(rename = "type")]
    pub state_type: String,
    pub color: String,
}

/// An issue, with its human-readable identifier precomputed at load time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    /// `<team key>-<number>`, or `???-<number>` when the team is unknown.
    pub identifier: String,
    pub title: String,
    pub number: Option<i64>,
    /// 1=Urgent .. 4=Low; absent means unprioritized and sorts last.
    pub priority: Option<i64>,
    pub team_id: Option<String>,
    pub state_id: Option<String>,
    pub assignee_id: Option<String>,
    pub project_id: Option<String>,
    pub label_ids: Vec<String>,
    /// Raw timestamp as stored upstream: ISO-8601 text or an epoch number.
    pub created_at: Value,
    pub updated_at: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub issue_id: String,
    pub user_id: Option<String>,
    /// Plain text, already extracted from the rich-text document.
    pub body: String,
    pub created_at: Value,
    pub updated_at: Value,
}

/// Immutable, point-in-time bundle of all entity maps.
///
/// Built fully off to the side by the loader and swapped in atomically;
/// never mutated after construction. Maps key by entity id, so iteration
/// is deterministic in ascending-id order.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub teams: BTreeMap<String, Team>,
    pub users: BTreeMap<String, User>,
    pub states: BTreeMap<String, WorkflowState>,
    pub issues: BTreeMap<String, Issue>,
    pub comments: BTreeMap<String, Comment>,
    /// issue id -> comment ids, in table iteration order. Presentation
    /// order (createdAt ascending) is applied by the query layer.
    pub comments_by_issue: BTreeMap<String, Vec<String>>,
    /// Epoch seconds at which the load pass started. Zero for the initial
    /// empty snapshot.
    pub loaded_at: f64,
}

impl Snapshot {
    /// Whether the TTL has elapsed since this snapshot was loaded.
    pub fn is_expired(&self, now: f64) -> bool {
        self.is_expired_after(now, CACHE_TTL_SECONDS)
    }

    pub fn is_expired_after(&self, now: f64, ttl: f64) -> bool {
        now - self.loaded_at > ttl
    }

    /// Whether the cache should reload: expired, or never successfully
    /// loaded any team (the cheap "still empty" signal).
    pub fn is_stale(&self, now: f64) -> bool {
        self.is_stale_after(now, CACHE_TTL_SECONDS)
    }

    pub fn is_stale_after(&self, now: f64, ttl: f64) -> bool {
        self.is_expired_after(now, ttl) || self.teams.is_empty()
    }

    pub fn state_name(&self, state_id: &str) -> &str {
        self.states.get(state_id).map_or("Unknown", |s| s.name.as_str())
    }

    pub fn state_type(&self, state_id: &str) -> &str {
        self.states
            .get(state_id)
            .map_or("unknown", |s| s.state_type.as_str())
    }
}
