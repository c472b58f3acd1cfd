//! Table-role detection
//!
//! The cache names its tables with unstable hashes, so the entity kind each
//! table holds has to be inferred. Detection samples the first record of
//! every non-internal table and tests it against ordered structural
//! predicates; this stays a single-record heuristic on purpose, keeping the
//! classification pass cheap even over very large tables.

use serde_json::{Map, Value};

use super::RawStore;
use crate::model::STATE_TYPES;
use crate::Result;

/// Mapping from entity kind to the physical table(s) holding it.
///
/// Issues, teams, comments and projects live in a single table each; users
/// and workflow states may be sharded across several.
#[derive(Debug, Clone, Default)]
pub struct DetectedTables {
    pub issues: Option<String>,
    pub teams: Option<String>,
    pub users: Vec<String>,
    pub workflow_states: Vec<String>,
    pub comments: Option<String>,
    pub projects: Option<String>,
}

fn has_fields(record: &Map<String, Value>, fields: &[&str]) -> bool {
    fields.iter().all(|f| record.contains_key(*f))
}

/// An issue: numbered, tied to a team and a workflow state, titled.
fn is_issue_record(record: &Map<String, Value>) -> bool {
    has_fields(record, &["number", "teamId", "stateId", "title"])
}

/// A team: keyed by a short all-uppercase alphabetic code.
fn is_team_record(record: &Map<String, Value>) -> bool {
    if !has_fields(record, &["key", "name"]) {
        return false;
    }
    match record.get("key").and_then(Value::as_str) {
        Some(key) => {
            !key.is_empty()
                && key.chars().count() <= 10
                && key.chars().all(|c| c.is_alphabetic() && c.is_uppercase())
        }
        None => false,
    }
}

/// A user: named, addressable, and carrying some avatar field.
fn is_user_record(record: &Map<String, Value>) -> bool {
    has_fields(record, &["name", "displayName", "email"])
        && (record.contains_key("avatarUrl") || record.contains_key("avatar"))
}

/// A workflow state: named, colored, and typed with a known state type.
fn is_workflow_state_record(record: &Map<String, Value>) -> bool {
    if !has_fields(record, &["name", "type", "color"]) {
        return false;
    }
    match record.get("type").and_then(Value::as_str) {
        Some(t) => STATE_TYPES.contains(&t),
        None => false,
    }
}

/// A comment: attached to an issue and a user, with a rich-text body.
fn is_comment_record(record: &Map<String, Value>) -> bool {
    has_fields(record, &["issueId", "userId", "bodyData", "createdAt"])
}

/// A project: described, scheduled, spanning teams.
fn is_project_record(record: &Map<String, Value>) -> bool {
    has_fields(
        record,
        &["name", "description", "teamIds", "startDate", "targetDate", "statusId"],
    )
}

/// Internal/system tables and partial indexes never hold entity records.
fn is_internal_table(name: &str) -> bool {
    name.starts_with('_') || name.contains("_partial")
}

/// Classify every table in the store by sampling its first record.
///
/// Predicates run in a fixed priority order per table and the first match
/// wins. A table that errors on read or yields no records is skipped
/// without failing the whole pass.
pub fn detect_tables(store: &dyn RawStore) -> Result<DetectedTables> {
    let mut result = DetectedTables::default();

    for table in store.table_names()? {
        if is_internal_table(&table) {
            continue;
        }

        let mut records = match store.iter_records(&table) {
            Ok(iter) => iter,
            Err(e) => {
                tracing::debug!("skipping unreadable table {table}: {e}");
                continue;
            }
        };
        let sample = match records.next() {
            Some(Ok(record)) => record,
            Some(Err(e)) => {
                tracing::debug!("skipping unreadable table {table}: {e}");
                continue;
            }
            None => continue,
        };
        let Some(record) = sample.value.as_object() else {
            continue;
        };

        if is_issue_record(record) && result.issues.is_none() {
            result.issues = Some(table);
        } else if is_team_record(record) && result.teams.is_none() {
            result.teams = Some(table);
        } else if is_user_record(record) && !result.users.contains(&table) {
            result.users.push(table);
        } else if is_workflow_state_record(record) && !result.workflow_states.contains(&table) {
            result.workflow_states.push(table);
        } else if is_comment_record(record) && result.comments.is_none() {
            result.comments = Some(table);
        } else if is_project_record(record) && result.projects.is_none() {
            result.projects = Some(table);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn issue_value() -> Value {
        json!({"id": "i1", "number": 7, "teamId": "t1", "stateId": "s1", "title": "Fix it"})
    }

    fn team_value() -> Value {
        json!({"id": "t1", "key": "ENG", "name": "Engineering"})
    }

    fn user_value() -> Value {
        json!({"id": "u1", "name": "Dana", "displayName": "dana", "email": "d@x.io", "avatarUrl": null})
    }

    fn state_value() -> Value {
        json!({"id": "s1", "name": "In Progress", "type": "started", "color": "#fff"})
    }

    #[test]
    fn test_classifies_each_kind() {
        let store = MemoryStore::new()
            .with_table("h_issues", vec![issue_value()])
            .with_table("h_teams", vec![team_value()])
            .with_table("h_users", vec![user_value()])
            .with_table("h_states", vec![state_value()])
            .with_table(
                "h_comments",
                vec![json!({"id": "c1", "issueId": "i1", "userId": "u1", "bodyData": "hi", "createdAt": "2024-01-01"})],
            )
            .with_table(
                "h_projects",
                vec![json!({"id": "p1", "name": "Launch", "description": "", "teamIds": [], "startDate": null, "targetDate": null, "statusId": "st"})],
            );

        let tables = detect_tables(&store).unwrap();
        assert_eq!(tables.issues.as_deref(), Some("h_issues"));
        assert_eq!(tables.teams.as_deref(), Some("h_teams"));
        assert_eq!(tables.users, vec!["h_users".to_string()]);
        assert_eq!(tables.workflow_states, vec!["h_states".to_string()]);
        assert_eq!(tables.comments.as_deref(), Some("h_comments"));
        assert_eq!(tables.projects.as_deref(), Some("h_projects"));
    }

    #[test]
    fn test_superset_record_still_matches() {
        let store = MemoryStore::new().with_table(
            "t",
            vec![json!({"number": 1, "teamId": "t", "stateId": "s", "title": "x", "extra": 1})],
        );
        let tables = detect_tables(&store).unwrap();
        assert_eq!(tables.issues.as_deref(), Some("t"));
    }

    #[test]
    fn test_first_single_winner_keeps_table() {
        // Two issue-shaped tables: the first (in name order) wins.
        let store = MemoryStore::new()
            .with_table("aa", vec![issue_value()])
            .with_table("bb", vec![issue_value()]);
        let tables = detect_tables(&store).unwrap();
        assert_eq!(tables.issues.as_deref(), Some("aa"));
    }

    #[test]
    fn test_users_and_states_accept_multiple_tables() {
        let store = MemoryStore::new()
            .with_table("u1", vec![user_value()])
            .with_table("u2", vec![user_value()])
            .with_table("s1", vec![state_value()])
            .with_table("s2", vec![state_value()]);
        let tables = detect_tables(&store).unwrap();
        assert_eq!(tables.users, vec!["u1".to_string(), "u2".to_string()]);
        assert_eq!(
            tables.workflow_states,
            vec!["s1".to_string(), "s2".to_string()]
        );
    }

    #[test]
    fn test_team_key_shape_is_enforced() {
        for bad in [
            json!({"id": "t", "key": "eng", "name": "n"}),
            json!({"id": "t", "key": "ENG1", "name": "n"}),
            json!({"id": "t", "key": "VERYLONGKEY", "name": "n"}),
            json!({"id": "t", "key": 7, "name": "n"}),
        ] {
            let store = MemoryStore::new().with_table("t", vec![bad]);
            let tables = detect_tables(&store).unwrap();
            assert!(tables.teams.is_none());
        }
    }

    #[test]
    fn test_internal_and_empty_tables_skipped() {
        let store = MemoryStore::new()
            .with_table("_meta", vec![team_value()])
            .with_table("idx_partial_1", vec![team_value()])
            .with_table("empty", vec![]);
        let tables = detect_tables(&store).unwrap();
        assert!(tables.teams.is_none());
    }

    #[test]
    fn test_unreadable_table_is_skipped() {
        let store = MemoryStore::new()
            .with_table("bad", vec![issue_value()])
            .poisoned_after("bad", 0)
            .with_table("good", vec![team_value()]);
        let tables = detect_tables(&store).unwrap();
        assert!(tables.issues.is_none());
        assert_eq!(tables.teams.as_deref(), Some("good"));
    }

    #[test]
    fn test_non_object_sample_skips_table() {
        let store = MemoryStore::new().with_table("t", vec![json!("blob"), issue_value()]);
        let tables = detect_tables(&store).unwrap();
        assert!(tables.issues.is_none());
    }

    #[test]
    fn test_invalid_state_type_rejected() {
        let store = MemoryStore::new().with_table(
            "t",
            vec![json!({"id": "s", "name": "n", "type": "paused", "color": "#000"})],
        );
        let tables = detect_tables(&store).unwrap();
        assert!(tables.workflow_states.is_empty());
    }
}
