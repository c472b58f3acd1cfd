//! Snapshot loader
//!
//! Reads every record from the detected tables and normalizes them into a
//! [`Snapshot`]. Load order matters: teams come first so issue identifiers
//! can be computed from the completed team map in the same pass. Records
//! missing an id are skipped; a table failing mid-iteration is abandoned
//! without aborting the load.

use serde_json::{Map, Value};

use super::epoch_now;
use crate::model::{Comment, Issue, Snapshot, Team, User, WorkflowState};
use crate::richtext;
use crate::store::{DetectedTables, RawStore};
use crate::{Error, Result};

pub struct SnapshotLoader<'a> {
    store: &'a dyn RawStore,
    tables: &'a DetectedTables,
}

/// Read a field as text, treating absent/null as empty and decoding any
/// other JSON scalar best-effort.
fn text(record: &Map<String, Value>, field: &str) -> String {
    match record.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn opt_text(record: &Map<String, Value>, field: &str) -> Option<String> {
    match record.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn opt_int(record: &Map<String, Value>, field: &str) -> Option<i64> {
    record.get(field).and_then(Value::as_i64)
}

fn string_list(record: &Map<String, Value>, field: &str) -> Vec<String> {
    match record.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Records without a non-empty string id are malformed and skipped.
fn record_id(record: &Map<String, Value>) -> Option<String> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

impl<'a> SnapshotLoader<'a> {
    pub fn new(store: &'a dyn RawStore, tables: &'a DetectedTables) -> Self {
        Self { store, tables }
    }

    /// Build a complete snapshot from the detected tables.
    ///
    /// Fails only when the backing store itself is gone; any single bad
    /// record or unreadable table is recovered from locally.
    pub fn load(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot {
            loaded_at: epoch_now(),
            ..Default::default()
        };

        if let Some(table) = &self.tables.teams {
            self.each_object(table, |record| {
                let Some(id) = record_id(record) else { return };
                snapshot.teams.insert(
                    id.clone(),
                    Team {
                        id,
                        key: text(record, "key"),
                        name: text(record, "name"),
                    },
                );
            })?;
        }

        for table in &self.tables.users {
            self.each_object(table, |record| {
                let Some(id) = record_id(record) else { return };
                // Sharded across tables; the first table to yield an id wins.
                if snapshot.users.contains_key(&id) {
                    return;
                }
                snapshot.users.insert(
                    id.clone(),
                    User {
                        id,
                        name: text(record, "name"),
                        display_name: text(record, "displayName"),
                        email: text(record, "email"),
                    },
                );
            })?;
        }

        for table in &self.tables.workflow_states {
            self.each_object(table, |record| {
                let Some(id) = record_id(record) else { return };
                if snapshot.states.contains_key(&id) {
                    return;
                }
                snapshot.states.insert(
                    id.clone(),
                    WorkflowState {
                        id,
                        name: text(record, "name"),
                        state_type: text(record, "type"),
                        color: text(record, "color"),
                    },
                );
            })?;
        }

        if let Some(table) = &self.tables.issues {
            // Teams are complete by now, so identifiers are final.
            self.each_object(table, |record| {
                let Some(id) = record_id(record) else { return };
                let team_id = opt_text(record, "teamId");
                let number = opt_int(record, "number");

                let team_key = team_id
                    .as_deref()
                    .and_then(|tid| snapshot.teams.get(tid))
                    .map_or("???", |team| team.key.as_str());
                let identifier = match number {
                    Some(n) => format!("{team_key}-{n}"),
                    None => format!("{team_key}-?"),
                };

                snapshot.issues.insert(
                    id.clone(),
                    Issue {
                        id,
                        identifier,
                        title: text(record, "title"),
                        number,
                        priority: opt_int(record, "priority"),
                        team_id,
                        state_id: opt_text(record, "stateId"),
                        assignee_id: opt_text(record, "assigneeId"),
                        project_id: opt_text(record, "projectId"),
                        label_ids: string_list(record, "labelIds"),
                        created_at: record.get("createdAt").cloned().unwrap_or(Value::Null),
                        updated_at: record.get("updatedAt").cloned().unwrap_or(Value::Null),
                    },
                );
            })?;
        }

        if let Some(table) = &self.tables.comments {
            self.each_object(table, |record| {
                let Some(id) = record_id(record) else { return };
                // Comments are useless without their issue.
                let Some(issue_id) = opt_text(record, "issueId").filter(|i| !i.is_empty()) else {
                    return;
                };
                let body = record
                    .get("bodyData")
                    .map(richtext::extract_body)
                    .unwrap_or_default();

                snapshot.comments.insert(
                    id.clone(),
                    Comment {
                        id: id.clone(),
                        issue_id: issue_id.clone(),
                        user_id: opt_text(record, "userId"),
                        body,
                        created_at: record.get("createdAt").cloned().unwrap_or(Value::Null),
                        updated_at: record.get("updatedAt").cloned().unwrap_or(Value::Null),
                    },
                );
                snapshot
                    .comments_by_issue
                    .entry(issue_id)
                    .or_default()
                    .push(id);
            })?;
        }

        tracing::debug!(
            teams = snapshot.teams.len(),
            users = snapshot.users.len(),
            states = snapshot.states.len(),
            issues = snapshot.issues.len(),
            comments = snapshot.comments.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Run `handle` over every structured record of one table.
    ///
    /// A read error mid-table abandons the remainder of that table only; a
    /// missing store propagates so the cache can report not-found.
    fn each_object(
        &self,
        table: &str,
        mut handle: impl FnMut(&Map<String, Value>),
    ) -> Result<()> {
        let records = match self.store.iter_records(table) {
            Ok(records) => records,
            Err(Error::StoreNotFound(path)) => return Err(Error::StoreNotFound(path)),
            Err(e) => {
                tracing::warn!("skipping table {table}: {e}");
                return Ok(());
            }
        };
        for record in records {
            match record {
                Ok(record) => {
                    if let Some(object) = record.value.as_object() {
                        handle(object);
                    }
                }
                Err(e) => {
                    tracing::warn!("abandoning table {table} mid-read: {e}");
                    break;
                }
            }
        }
        Ok(())
    }
}
