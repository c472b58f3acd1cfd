//! Query engine implementation
//!
//! Provides the read operations served to clients:
//! - Fuzzy user/team lookup with word-start scoring
//! - Issue lookup by identifier and title search
//! - Filtered, canonically ordered, keyset-paginated issue listings
//! - Per-user issue reports with per-state counts
//!
//! All candidate issues are sorted into one canonical total order -
//! ascending by (priority-or-4, id) - before filtering and pagination, so
//! cursor-chained pages reproduce the full filtered list exactly.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::time::parse_timestamp;
use crate::model::{Comment, Issue, Snapshot, Team, User, WorkflowState, STATE_TYPES};
use crate::snapshot::SnapshotCache;
use crate::{Error, Result};

/// Hard cap on page sizes, matching the tool contract.
const MAX_PAGE_SIZE: usize = 100;

/// Priority assumed for issues without one; sorts after every real priority.
const UNPRIORITIZED: i64 = 4;

/// Filters for [`QueryEngine::list_issues`], combined as a conjunction.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    /// Assignee name, resolved through the fuzzy user match.
    pub assignee: Option<String>,
    /// Team key or name, resolved through the team match.
    pub team: Option<String>,
    pub state_type: Option<String>,
    pub priority: Option<i64>,
    /// Epoch seconds, epoch millis or ISO-8601 text.
    pub updated_after: Option<Value>,
}

/// An issue enriched with its resolved workflow state.
#[derive(Debug, Clone, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: Issue,
    pub state: String,
    #[serde(rename = "stateType")]
    pub state_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePage {
    pub issues: Vec<IssueView>,
    pub next_cursor: Option<String>,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub issues: Vec<IssueView>,
    pub next_cursor: Option<String>,
    pub match_count: usize,
}

/// Compact issue line for per-user reports.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactIssue {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub priority: Option<i64>,
    pub state: String,
    pub state_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyIssuesUser {
    pub name: String,
    pub email: String,
}

/// Paginated per-user report. Counts cover the full assigned set, before
/// the state-type/updated-after refinements are applied.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyIssues {
    pub user: MyIssuesUser,
    pub total_issues: usize,
    pub counts_by_state_type: BTreeMap<String, usize>,
    pub matching_count: usize,
    pub issues: Vec<CompactIssue>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRef {
    pub identifier: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    pub issue: IssueRef,
    pub comment_count: usize,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub issue_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamView {
    #[serde(flatten)]
    pub team: Team,
    pub issue_count: usize,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub teams: usize,
    pub users: usize,
    pub states: usize,
    pub issues: usize,
    pub comments: usize,
}

/// Query engine over the snapshot cache.
///
/// Every operation fetches the snapshot once up front, so a reload in the
/// middle of an operation cannot mix data from two snapshots.
pub struct QueryEngine<'a> {
    cache: &'a SnapshotCache,
}

impl<'a> QueryEngine<'a> {
    pub fn new(cache: &'a SnapshotCache) -> Self {
        Self { cache }
    }

    /// Find a user by name or display name (case-insensitive substring).
    ///
    /// Word-start matches outrank mid-word ones: "daniel" finds
    /// "Daniel Kessl" before "Zachary McDaniel".
    pub fn find_user(&self, search: &str) -> Result<Option<User>> {
        let snapshot = self.cache.snapshot()?;
        Ok(find_user_in(&snapshot, search).cloned())
    }

    /// Find a team by exact key or name substring (case-insensitive).
    pub fn find_team(&self, search: &str) -> Result<Option<Team>> {
        let snapshot = self.cache.snapshot()?;
        Ok(find_team_in(&snapshot, search).cloned())
    }

    /// Look up an issue by its identifier, e.g. "ENG-142".
    pub fn issue_by_identifier(&self, identifier: &str) -> Result<Option<IssueView>> {
        let snapshot = self.cache.snapshot()?;
        Ok(issue_by_identifier_in(&snapshot, identifier).map(|i| enrich(&snapshot, i)))
    }

    /// All issues assigned to the given user id.
    pub fn issues_for_user(&self, user_id: &str) -> Result<Vec<Issue>> {
        let snapshot = self.cache.snapshot()?;
        Ok(snapshot
            .issues
            .values()
            .filter(|i| i.assignee_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    /// Title substring search in plain iteration order, truncated at
    /// `limit`. The paginated variant is [`Self::search_issues`].
    pub fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<Issue>> {
        let snapshot = self.cache.snapshot()?;
        let needle = query.to_lowercase();
        Ok(snapshot
            .issues
            .values()
            .filter(|i| i.title.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    /// Canonically ordered, paginated title search.
    pub fn search_issues(
        &self,
        query: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<SearchPage> {
        let snapshot = self.cache.snapshot()?;
        let limit = limit.min(MAX_PAGE_SIZE);
        let needle = query.to_lowercase();

        let matches: Vec<&Issue> = canonical_order(&snapshot)
            .into_iter()
            .filter(|i| i.title.to_lowercase().contains(&needle))
            .collect();
        let match_count = matches.len();

        let (page, next_cursor) = paginate(matches, cursor, limit);
        Ok(SearchPage {
            issues: page.into_iter().map(|i| enrich(&snapshot, i)).collect(),
            next_cursor,
            match_count,
        })
    }

    /// The general filtered listing: canonical order, AND-conjunction
    /// filters, keyset pagination.
    ///
    /// An assignee/team filter that resolves to nothing short-circuits to
    /// an empty page; an unparsable `updated_after` is a validation error.
    pub fn list_issues(
        &self,
        filter: &IssueFilter,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<IssuePage> {
        let snapshot = self.cache.snapshot()?;
        let limit = limit.min(MAX_PAGE_SIZE);

        let updated_after = parse_updated_after(filter.updated_after.as_ref())?;

        let assignee_id = match &filter.assignee {
            Some(name) => match find_user_in(&snapshot, name) {
                Some(user) => Some(user.id.clone()),
                None => return Ok(empty_issue_page()),
            },
            None => None,
        };
        let team_id = match &filter.team {
            Some(search) => match find_team_in(&snapshot, search) {
                Some(team) => Some(team.id.clone()),
                None => return Ok(empty_issue_page()),
            },
            None => None,
        };

        let filtered: Vec<&Issue> = canonical_order(&snapshot)
            .into_iter()
            .filter(|issue| {
                if let Some(aid) = &assignee_id {
                    if issue.assignee_id.as_deref() != Some(aid.as_str()) {
                        return false;
                    }
                }
                if let Some(tid) = &team_id {
                    if issue.team_id.as_deref() != Some(tid.as_str()) {
                        return false;
                    }
                }
                if let Some(st) = &filter.state_type {
                    if snapshot.state_type(issue.state_id.as_deref().unwrap_or("")) != st {
                        return false;
                    }
                }
                if let Some(p) = filter.priority {
                    if issue.priority != Some(p) {
                        return false;
                    }
                }
                if let Some(after) = updated_after {
                    match parse_timestamp(&issue.updated_at) {
                        Some(ts) if ts >= after => {}
                        _ => return false,
                    }
                }
                true
            })
            .collect();
        let total_count = filtered.len();

        let (page, next_cursor) = paginate(filtered, cursor, limit);
        Ok(IssuePage {
            issues: page.into_iter().map(|i| enrich(&snapshot, i)).collect(),
            next_cursor,
            total_count,
        })
    }

    /// Paginated report of one user's issues with per-state counts.
    ///
    /// The counts are computed over everything assigned to the user; the
    /// state-type/updated-after refinements only narrow the page, so the
    /// caller sees both the refined slice and the full distribution.
    pub fn my_issues(
        &self,
        name: &str,
        state_type: Option<&str>,
        updated_after: Option<&Value>,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<MyIssues> {
        let snapshot = self.cache.snapshot()?;
        let limit = limit.min(MAX_PAGE_SIZE);

        let updated_after = parse_updated_after(updated_after)?;

        let Some(user) = find_user_in(&snapshot, name).cloned() else {
            return Err(Error::NotFound(format!("User '{name}' not found")));
        };

        let assigned: Vec<&Issue> = canonical_order(&snapshot)
            .into_iter()
            .filter(|i| i.assignee_id.as_deref() == Some(user.id.as_str()))
            .collect();

        let mut counts_by_state_type: BTreeMap<String, usize> = BTreeMap::new();
        for issue in &assigned {
            let st = snapshot.state_type(issue.state_id.as_deref().unwrap_or(""));
            *counts_by_state_type.entry(st.to_string()).or_insert(0) += 1;
        }
        let total_issues = counts_by_state_type.values().sum();

        let matching: Vec<&Issue> = assigned
            .into_iter()
            .filter(|issue| {
                if let Some(st) = state_type {
                    if snapshot.state_type(issue.state_id.as_deref().unwrap_or("")) != st {
                        return false;
                    }
                }
                if let Some(after) = updated_after {
                    if parse_timestamp(&issue.updated_at).unwrap_or(0.0) < after {
                        return false;
                    }
                }
                true
            })
            .collect();
        let matching_count = matching.len();

        let (page, next_cursor) = paginate(matching, cursor, limit);
        let issues = page
            .into_iter()
            .map(|issue| CompactIssue {
                id: issue.id.clone(),
                identifier: issue.identifier.clone(),
                title: issue.title.clone(),
                priority: issue.priority,
                state: snapshot
                    .state_name(issue.state_id.as_deref().unwrap_or(""))
                    .to_string(),
                state_type: snapshot
                    .state_type(issue.state_id.as_deref().unwrap_or(""))
                    .to_string(),
            })
            .collect();

        Ok(MyIssues {
            user: MyIssuesUser {
                name: user.name,
                email: user.email,
            },
            total_issues,
            counts_by_state_type,
            matching_count,
            issues,
            next_cursor,
        })
    }

    /// All comments on an issue with resolved authors, createdAt ascending.
    pub fn issue_comments(&self, identifier: &str) -> Result<CommentThread> {
        let snapshot = self.cache.snapshot()?;
        let Some(issue) = issue_by_identifier_in(&snapshot, identifier) else {
            return Err(Error::NotFound(format!("Issue '{identifier}' not found")));
        };

        let mut comments: Vec<&Comment> = snapshot
            .comments_by_issue
            .get(&issue.id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| snapshot.comments.get(id))
                    .collect()
            })
            .unwrap_or_default();
        comments.sort_by(|a, b| {
            let ta = parse_timestamp(&a.created_at).unwrap_or(0.0);
            let tb = parse_timestamp(&b.created_at).unwrap_or(0.0);
            ta.total_cmp(&tb)
        });

        let views: Vec<CommentView> = comments
            .into_iter()
            .map(|c| CommentView {
                id: c.id.clone(),
                author: c
                    .user_id
                    .as_deref()
                    .and_then(|uid| snapshot.users.get(uid))
                    .map_or_else(|| "Unknown".to_string(), |u| u.name.clone()),
                body: c.body.clone(),
                created_at: c.created_at.clone(),
            })
            .collect();

        Ok(CommentThread {
            issue: IssueRef {
                identifier: issue.identifier.clone(),
                title: issue.title.clone(),
            },
            comment_count: views.len(),
            comments: views,
        })
    }

    /// All users with their assigned-issue counts, busiest first.
    pub fn list_users(&self, limit: usize) -> Result<Vec<UserView>> {
        let snapshot = self.cache.snapshot()?;
        let mut views: Vec<UserView> = snapshot
            .users
            .values()
            .take(limit)
            .map(|user| UserView {
                issue_count: snapshot
                    .issues
                    .values()
                    .filter(|i| i.assignee_id.as_deref() == Some(user.id.as_str()))
                    .count(),
                user: user.clone(),
            })
            .collect();
        views.sort_by(|a, b| b.issue_count.cmp(&a.issue_count));
        Ok(views)
    }

    /// A fuzzy-matched user with their assigned-issue count.
    pub fn get_user(&self, name: &str) -> Result<Option<UserView>> {
        let snapshot = self.cache.snapshot()?;
        Ok(find_user_in(&snapshot, name).map(|user| UserView {
            issue_count: snapshot
                .issues
                .values()
                .filter(|i| i.assignee_id.as_deref() == Some(user.id.as_str()))
                .count(),
            user: user.clone(),
        }))
    }

    /// All teams with their issue counts, sorted by key.
    pub fn list_teams(&self) -> Result<Vec<TeamView>> {
        let snapshot = self.cache.snapshot()?;
        let mut views: Vec<TeamView> = snapshot
            .teams
            .values()
            .map(|team| TeamView {
                issue_count: snapshot
                    .issues
                    .values()
                    .filter(|i| i.team_id.as_deref() == Some(team.id.as_str()))
                    .count(),
                team: team.clone(),
            })
            .collect();
        views.sort_by(|a, b| a.team.key.cmp(&b.team.key));
        Ok(views)
    }

    /// All workflow states, grouped in the fixed lifecycle order.
    pub fn list_states(&self) -> Result<Vec<WorkflowState>> {
        let snapshot = self.cache.snapshot()?;
        let mut ordered = Vec::new();
        for state_type in STATE_TYPES {
            ordered.extend(
                snapshot
                    .states
                    .values()
                    .filter(|s| s.state_type == state_type)
                    .cloned(),
            );
        }
        Ok(ordered)
    }

    /// Entity counts for the current snapshot.
    pub fn summary(&self) -> Result<Summary> {
        let snapshot = self.cache.snapshot()?;
        Ok(Summary {
            teams: snapshot.teams.len(),
            users: snapshot.users.len(),
            states: snapshot.states.len(),
            issues: snapshot.issues.len(),
            comments: snapshot.comments.len(),
        })
    }
}

/// Canonical total order: ascending (priority-or-4, id).
fn canonical_order(snapshot: &Snapshot) -> Vec<&Issue> {
    let mut issues: Vec<&Issue> = snapshot.issues.values().collect();
    issues.sort_by(|a, b| {
        let pa = a.priority.unwrap_or(UNPRIORITIZED);
        let pb = b.priority.unwrap_or(UNPRIORITIZED);
        pa.cmp(&pb).then_with(|| a.id.cmp(&b.id))
    });
    issues
}

/// Keyset pagination: drop everything up to and including the cursor id,
/// then take one page plus a lookahead element to detect a next page.
fn paginate<'s>(
    issues: Vec<&'s Issue>,
    cursor: Option<&str>,
    limit: usize,
) -> (Vec<&'s Issue>, Option<String>) {
    let after_cursor: Vec<&Issue> = match cursor {
        Some(cursor) => issues
            .into_iter()
            .skip_while(|i| i.id != cursor)
            .skip(1)
            .collect(),
        None => issues,
    };

    let has_more = after_cursor.len() > limit;
    let page: Vec<&Issue> = after_cursor.into_iter().take(limit).collect();
    let next_cursor = if has_more {
        page.last().map(|i| i.id.clone())
    } else {
        None
    };
    (page, next_cursor)
}

fn enrich(snapshot: &Snapshot, issue: &Issue) -> IssueView {
    let state_id = issue.state_id.as_deref().unwrap_or("");
    IssueView {
        issue: issue.clone(),
        state: snapshot.state_name(state_id).to_string(),
        state_type: snapshot.state_type(state_id).to_string(),
    }
}

fn empty_issue_page() -> IssuePage {
    IssuePage {
        issues: Vec::new(),
        next_cursor: None,
        total_count: 0,
    }
}

fn parse_updated_after(value: Option<&Value>) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match parse_timestamp(v) {
            Some(ts) => Ok(Some(ts)),
            None => {
                let shown = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                Err(Error::Validation(format!(
                    "Invalid updated_after format: {shown}"
                )))
            }
        },
    }
}

/// Scored fuzzy user match. Ties keep the first candidate in iteration
/// order.
fn find_user_in<'s>(snapshot: &'s Snapshot, search: &str) -> Option<&'s User> {
    let needle = search.to_lowercase();
    let mut best: Option<(i32, &User)> = None;

    for user in snapshot.users.values() {
        let name = user.name.to_lowercase();
        let display = user.display_name.to_lowercase();
        if !name.contains(&needle) && !display.contains(&needle) {
            continue;
        }

        let score = if name.starts_with(&needle) {
            100
        } else if name.contains(&format!(" {needle}")) {
            // The term starts a later word of the name.
            50
        } else if display.starts_with(&needle) {
            40
        } else {
            10
        };

        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, user));
        }
    }
    best.map(|(_, user)| user)
}

/// Exact key match is checked before the name substring match; the order
/// is behaviorally significant and must not be swapped.
fn find_team_in<'s>(snapshot: &'s Snapshot, search: &str) -> Option<&'s Team> {
    let needle = search.to_lowercase();
    let key = search.to_uppercase();
    snapshot
        .teams
        .values()
        .find(|team| team.key == key || team.name.to_lowercase().contains(&needle))
}

fn issue_by_identifier_in<'s>(snapshot: &'s Snapshot, identifier: &str) -> Option<&'s Issue> {
    let wanted = identifier.to_uppercase();
    snapshot
        .issues
        .values()
        .find(|i| i.identifier.to_uppercase() == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn fixture_cache() -> SnapshotCache {
        let store = MemoryStore::new()
            .with_table(
                "h_teams",
                vec![
                    json!({"id": "team1", "key": "ENG", "name": "Engineering"}),
                    json!({"id": "team2", "key": "OPS", "name": "Operations"}),
                ],
            )
            .with_table(
                "h_users",
                vec![
                    json!({"id": "user1", "name": "Daniel Kessl", "displayName": "daniel", "email": "dk@x.io", "avatarUrl": null}),
                    json!({"id": "user2", "name": "Zachary McDaniel", "displayName": "zach", "email": "zm@x.io", "avatarUrl": null}),
                ],
            )
            .with_table(
                "h_states",
                vec![
                    json!({"id": "s_started", "name": "In Progress", "type": "started", "color": "#00f"}),
                    json!({"id": "s_done", "name": "Done", "type": "completed", "color": "#0f0"}),
                ],
            )
            .with_table(
                "h_issues",
                vec![
                    json!({"id": "2", "number": 2, "teamId": "team1", "stateId": "s_started",
                           "title": "Fix login flow", "priority": 1, "assigneeId": "user1",
                           "updatedAt": "2024-03-01T00:00:00Z"}),
                    json!({"id": "1", "number": 1, "teamId": "team1", "stateId": "s_done",
                           "title": "Upgrade parser", "priority": 1, "assigneeId": "user1",
                           "updatedAt": "2024-01-01T00:00:00Z"}),
                    json!({"id": "3", "number": 3, "teamId": "team2", "stateId": "s_started",
                           "title": "Fix deploy script", "assigneeId": "user2",
                           "updatedAt": "2024-02-01T00:00:00Z"}),
                ],
            )
            .with_table(
                "h_comments",
                vec![
                    json!({"id": "c2", "issueId": "2", "userId": "user2",
                           "bodyData": {"type": "doc", "content": [{"type": "text", "text": "later"}]},
                           "createdAt": "2024-03-02T00:00:00Z"}),
                    json!({"id": "c1", "issueId": "2", "userId": "user1",
                           "bodyData": "earlier", "createdAt": "2024-03-01T00:00:00Z"}),
                ],
            );
        SnapshotCache::new(Box::new(store))
    }

    #[test]
    fn test_find_user_prefers_word_start() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let user = engine.find_user("daniel").unwrap().unwrap();
        assert_eq!(user.name, "Daniel Kessl");
    }

    #[test]
    fn test_find_user_mid_word_still_matches() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let user = engine.find_user("cdani").unwrap().unwrap();
        assert_eq!(user.name, "Zachary McDaniel");
    }

    #[test]
    fn test_find_team_exact_key_before_name() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        assert_eq!(engine.find_team("ops").unwrap().unwrap().key, "OPS");
        assert_eq!(engine.find_team("engineer").unwrap().unwrap().key, "ENG");
        assert!(engine.find_team("marketing").unwrap().is_none());
    }

    #[test]
    fn test_issue_by_identifier_case_insensitive() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let view = engine.issue_by_identifier("eng-2").unwrap().unwrap();
        assert_eq!(view.issue.title, "Fix login flow");
        assert_eq!(view.state, "In Progress");
        assert_eq!(view.state_type, "started");
    }

    #[test]
    fn test_canonical_order_example() {
        // A(priority=1,id="2"), B(priority=1,id="1"), C(no priority,id="3")
        // must order B, A, C.
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let page = engine.list_issues(&IssueFilter::default(), 50, None).unwrap();
        let ids: Vec<&str> = page.issues.iter().map(|v| v.issue.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_pagination_chain_reproduces_full_list() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let full = engine.list_issues(&IssueFilter::default(), 50, None).unwrap();
        let all_ids: Vec<String> = full.issues.iter().map(|v| v.issue.id.clone()).collect();

        for limit in 1..=3 {
            let mut cursor: Option<String> = None;
            let mut collected = Vec::new();
            loop {
                let page = engine
                    .list_issues(&IssueFilter::default(), limit, cursor.as_deref())
                    .unwrap();
                collected.extend(page.issues.iter().map(|v| v.issue.id.clone()));
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            assert_eq!(collected, all_ids, "limit {limit}");
        }
    }

    #[test]
    fn test_filters_are_a_conjunction() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);

        let by_team_then_priority = engine
            .list_issues(
                &IssueFilter {
                    team: Some("ENG".to_string()),
                    priority: Some(1),
                    ..Default::default()
                },
                50,
                None,
            )
            .unwrap();
        let by_priority_then_team = engine
            .list_issues(
                &IssueFilter {
                    priority: Some(1),
                    team: Some("ENG".to_string()),
                    ..Default::default()
                },
                50,
                None,
            )
            .unwrap();

        let ids = |p: &IssuePage| {
            p.issues
                .iter()
                .map(|v| v.issue.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&by_team_then_priority), ids(&by_priority_then_team));
        assert_eq!(ids(&by_team_then_priority), vec!["1", "2"]);
    }

    #[test]
    fn test_state_type_and_updated_after_filters() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);

        let started = engine
            .list_issues(
                &IssueFilter {
                    state_type: Some("started".to_string()),
                    ..Default::default()
                },
                50,
                None,
            )
            .unwrap();
        let ids: Vec<&str> = started.issues.iter().map(|v| v.issue.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);

        let recent = engine
            .list_issues(
                &IssueFilter {
                    updated_after: Some(json!("2024-02-15T00:00:00Z")),
                    ..Default::default()
                },
                50,
                None,
            )
            .unwrap();
        let ids: Vec<&str> = recent.issues.iter().map(|v| v.issue.id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[test]
    fn test_invalid_updated_after_is_validation_error() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let err = engine
            .list_issues(
                &IssueFilter {
                    updated_after: Some(json!("soon")),
                    ..Default::default()
                },
                50,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "Invalid updated_after format: soon");
    }

    #[test]
    fn test_unresolvable_filters_short_circuit_empty() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let page = engine
            .list_issues(
                &IssueFilter {
                    assignee: Some("nobody at all".to_string()),
                    ..Default::default()
                },
                50,
                None,
            )
            .unwrap();
        assert!(page.issues.is_empty());
        assert_eq!(page.total_count, 0);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_search_titles_iteration_order() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let hits = engine.search_titles("fix", 10).unwrap();
        // Map iteration order (ascending id), not canonical order.
        let ids: Vec<&str> = hits.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);

        assert_eq!(engine.search_titles("fix", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_search_issues_paginated() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let first = engine.search_issues("fix", 1, None).unwrap();
        assert_eq!(first.match_count, 2);
        assert_eq!(first.issues[0].issue.id, "2");
        let cursor = first.next_cursor.expect("more results");

        let second = engine.search_issues("fix", 1, Some(&cursor)).unwrap();
        assert_eq!(second.issues[0].issue.id, "3");
        assert!(second.next_cursor.is_none());
    }

    #[test]
    fn test_my_issues_counts_before_refinement() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let report = engine
            .my_issues("daniel", Some("started"), None, 20, None)
            .unwrap();

        assert_eq!(report.user.name, "Daniel Kessl");
        assert_eq!(report.total_issues, 2);
        assert_eq!(report.counts_by_state_type["started"], 1);
        assert_eq!(report.counts_by_state_type["completed"], 1);
        // Refined page only holds the started issue.
        assert_eq!(report.matching_count, 1);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].identifier, "ENG-2");
    }

    #[test]
    fn test_my_issues_unknown_user() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let err = engine.my_issues("X", None, None, 20, None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.to_string(), "User 'X' not found");
    }

    #[test]
    fn test_issue_comments_sorted_by_created_at() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let thread = engine.issue_comments("ENG-2").unwrap();

        assert_eq!(thread.issue.identifier, "ENG-2");
        assert_eq!(thread.comment_count, 2);
        // Index order was c2, c1; presentation order is createdAt ascending.
        assert_eq!(thread.comments[0].id, "c1");
        assert_eq!(thread.comments[0].body, "earlier");
        assert_eq!(thread.comments[1].id, "c2");
        assert_eq!(thread.comments[1].body, "later");
        assert_eq!(thread.comments[1].author, "Zachary McDaniel");
    }

    #[test]
    fn test_issue_comments_unknown_issue() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        assert!(matches!(
            engine.issue_comments("ENG-999").unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn test_list_users_sorted_by_issue_count() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let users = engine.list_users(100).unwrap();
        assert_eq!(users[0].user.name, "Daniel Kessl");
        assert_eq!(users[0].issue_count, 2);
        assert_eq!(users[1].issue_count, 1);
    }

    #[test]
    fn test_list_states_in_lifecycle_order() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let states = engine.list_states().unwrap();
        let types: Vec<&str> = states.iter().map(|s| s.state_type.as_str()).collect();
        assert_eq!(types, vec!["started", "completed"]);
    }

    #[test]
    fn test_summary_counts() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let summary = engine.summary().unwrap();
        assert_eq!(summary.teams, 2);
        assert_eq!(summary.users, 2);
        assert_eq!(summary.states, 2);
        assert_eq!(summary.issues, 3);
        assert_eq!(summary.comments, 2);
    }

    #[test]
    fn test_issues_for_user() {
        let cache = fixture_cache();
        let engine = QueryEngine::new(&cache);
        let issues = engine.issues_for_user("user1").unwrap();
        assert_eq!(issues.len(), 2);
    }
}
