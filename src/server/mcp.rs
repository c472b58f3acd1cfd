//! MCP stdio service
//!
//! Wires the query engine to the MCP protocol: one tool per query
//! operation, with JSON results. User-facing failures (bad date filters,
//! unknown report subjects) come back as `{"error": ...}` values per the
//! tool contracts; transport and internal failures use protocol errors.

use std::sync::Arc;

use async_trait::async_trait;
use mcp_sdk_rs::error::{Error as McpError, ErrorCode};
use mcp_sdk_rs::server::{Server, ServerHandler};
use mcp_sdk_rs::transport::stdio::StdioTransport;
use mcp_sdk_rs::types::{
    ClientCapabilities, Implementation, ListToolsResult, ServerCapabilities, Tool, ToolResult,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::query::{IssueFilter, QueryEngine};
use crate::snapshot::SnapshotCache;
use crate::Error;

#[derive(Deserialize)]
struct CallToolRequest {
    name: String,
    arguments: Option<Value>,
}

#[derive(Deserialize)]
struct ListIssuesArgs {
    assignee: Option<String>,
    team: Option<String>,
    state_type: Option<String>,
    priority: Option<i64>,
    updated_after: Option<Value>,
    #[serde(default = "default_page_limit")]
    limit: usize,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_page_limit")]
    limit: usize,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct IdentifierArgs {
    identifier: String,
}

#[derive(Deserialize)]
struct NameArgs {
    name: String,
}

#[derive(Deserialize)]
struct ListUsersArgs {
    #[serde(default = "default_user_limit")]
    limit: usize,
}

#[derive(Deserialize)]
struct MyIssuesArgs {
    name: String,
    state_type: Option<String>,
    updated_after: Option<Value>,
    #[serde(default = "default_report_limit")]
    limit: usize,
    cursor: Option<String>,
}

fn default_page_limit() -> usize {
    50
}

fn default_user_limit() -> usize {
    100
}

fn default_report_limit() -> usize {
    20
}

#[derive(Clone)]
pub struct McpService {
    cache: Arc<SnapshotCache>,
}

impl McpService {
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        Self { cache }
    }

    pub async fn run_stdio(&self) -> anyhow::Result<()> {
        let (read_tx, read_rx) = mpsc::channel::<String>(32);
        let (write_tx, mut write_rx) = mpsc::channel::<String>(32);

        // Stdin reader
        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let mut reader = BufReader::new(stdin).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if read_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        // Stdout writer
        tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(msg) = write_rx.recv().await {
                let _ = stdout.write_all(msg.as_bytes()).await;
                let _ = stdout.write_all(b"\n").await;
                let _ = stdout.flush().await;
            }
        });

        let transport = StdioTransport::new(read_rx, write_tx);
        let server = Server::new(Arc::new(transport), Arc::new(self.clone()));
        server.start().await?;
        Ok(())
    }

    fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let engine = QueryEngine::new(&self.cache);
        match name {
            "list_issues" => {
                let args: ListIssuesArgs = parse_args(arguments)?;
                let filter = IssueFilter {
                    assignee: args.assignee,
                    team: args.team,
                    state_type: args.state_type,
                    priority: args.priority,
                    updated_after: args.updated_after,
                };
                match engine.list_issues(&filter, args.limit, args.cursor.as_deref()) {
                    Ok(page) => to_value(&page),
                    Err(Error::Validation(msg)) => Ok(json!({
                        "error": msg,
                        "issues": [],
                        "nextCursor": null,
                        "totalCount": 0,
                    })),
                    Err(e) => Err(internal(e)),
                }
            }
            "get_issue" => {
                let args: IdentifierArgs = parse_args(arguments)?;
                match engine.issue_by_identifier(&args.identifier) {
                    Ok(Some(view)) => to_value(&view),
                    Ok(None) => Ok(Value::Null),
                    Err(e) => Err(internal(e)),
                }
            }
            "search_issues" => {
                let args: SearchArgs = parse_args(arguments)?;
                match engine.search_issues(&args.query, args.limit, args.cursor.as_deref()) {
                    Ok(page) => to_value(&page),
                    Err(e) => Err(internal(e)),
                }
            }
            "list_users" => {
                let args: ListUsersArgs = parse_args(arguments)?;
                match engine.list_users(args.limit) {
                    Ok(users) => to_value(&users),
                    Err(e) => Err(internal(e)),
                }
            }
            "get_user" => {
                let args: NameArgs = parse_args(arguments)?;
                match engine.get_user(&args.name) {
                    Ok(Some(user)) => to_value(&user),
                    Ok(None) => Ok(Value::Null),
                    Err(e) => Err(internal(e)),
                }
            }
            "list_teams" => match engine.list_teams() {
                Ok(teams) => to_value(&teams),
                Err(e) => Err(internal(e)),
            },
            "list_states" => match engine.list_states() {
                Ok(states) => to_value(&states),
                Err(e) => Err(internal(e)),
            },
            "get_my_issues" => {
                let args: MyIssuesArgs = parse_args(arguments)?;
                match engine.my_issues(
                    &args.name,
                    args.state_type.as_deref(),
                    args.updated_after.as_ref(),
                    args.limit,
                    args.cursor.as_deref(),
                ) {
                    Ok(report) => to_value(&report),
                    Err(e) => error_value_or_internal(e),
                }
            }
            "get_issue_comments" => {
                let args: IdentifierArgs = parse_args(arguments)?;
                match engine.issue_comments(&args.identifier) {
                    Ok(thread) => to_value(&thread),
                    Err(e) => error_value_or_internal(e),
                }
            }
            "get_summary" => match engine.summary() {
                Ok(summary) => to_value(&summary),
                Err(e) => Err(internal(e)),
            },
            _ => Err(McpError::protocol(
                ErrorCode::MethodNotFound,
                name.to_string(),
            )),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, McpError> {
    serde_json::from_value(arguments)
        .map_err(|e| McpError::protocol(ErrorCode::InvalidParams, e.to_string()))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| internal(e))
}

fn internal(e: impl std::fmt::Display) -> McpError {
    McpError::protocol(ErrorCode::InternalError, e.to_string())
}

/// Operation-subject failures become structured error values; everything
/// else stays a protocol error.
fn error_value_or_internal(e: Error) -> Result<Value, McpError> {
    match e {
        Error::Validation(msg) | Error::NotFound(msg) => Ok(json!({"error": msg})),
        other => Err(internal(other)),
    }
}

fn tool(name: &str, description: &str, schema: Value) -> Result<Tool, McpError> {
    Ok(Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: serde_json::from_value(schema)
            .map_err(|e| McpError::protocol(ErrorCode::ParseError, e.to_string()))?,
        annotations: None,
    })
}

fn page_properties() -> Value {
    json!({
        "limit": { "type": "integer" },
        "cursor": { "type": "string" }
    })
}

#[async_trait]
impl ServerHandler for McpService {
    async fn initialize(
        &self,
        _implementation: Implementation,
        _capabilities: ClientCapabilities,
    ) -> Result<ServerCapabilities, McpError> {
        Ok(ServerCapabilities::default())
    }

    async fn shutdown(&self) -> Result<(), McpError> {
        Ok(())
    }

    async fn handle_method(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, McpError> {
        match method {
            "tools/list" => {
                let mut page = page_properties();
                let filters = page.as_object_mut().expect("object literal");
                filters.insert("assignee".into(), json!({ "type": "string" }));
                filters.insert("team".into(), json!({ "type": "string" }));
                filters.insert("state_type".into(), json!({ "type": "string" }));
                filters.insert("priority".into(), json!({ "type": "integer" }));
                filters.insert("updated_after".into(), json!({ "type": "string" }));

                let tools = vec![
                    tool(
                        "list_issues",
                        "List issues with optional filters and keyset pagination",
                        json!({ "type": "object", "properties": page, "required": [] }),
                    )?,
                    tool(
                        "get_issue",
                        "Get a single issue by its identifier (e.g. 'ENG-142')",
                        json!({
                            "type": "object",
                            "properties": { "identifier": { "type": "string" } },
                            "required": ["identifier"]
                        }),
                    )?,
                    tool(
                        "search_issues",
                        "Search issues by title, case-insensitive, paginated",
                        json!({
                            "type": "object",
                            "properties": {
                                "query": { "type": "string" },
                                "limit": { "type": "integer" },
                                "cursor": { "type": "string" }
                            },
                            "required": ["query"]
                        }),
                    )?,
                    tool(
                        "list_users",
                        "List users with their assigned-issue counts",
                        json!({
                            "type": "object",
                            "properties": { "limit": { "type": "integer" } },
                            "required": []
                        }),
                    )?,
                    tool(
                        "get_user",
                        "Find a user by name (partial match, prefers word starts)",
                        json!({
                            "type": "object",
                            "properties": { "name": { "type": "string" } },
                            "required": ["name"]
                        }),
                    )?,
                    tool(
                        "list_teams",
                        "List all teams with their issue counts",
                        json!({ "type": "object", "properties": {}, "required": [] }),
                    )?,
                    tool(
                        "list_states",
                        "List workflow states grouped by lifecycle order",
                        json!({ "type": "object", "properties": {}, "required": [] }),
                    )?,
                    tool(
                        "get_my_issues",
                        "Paginated issues for one user with per-state counts",
                        json!({
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "state_type": { "type": "string" },
                                "updated_after": { "type": "string" },
                                "limit": { "type": "integer" },
                                "cursor": { "type": "string" }
                            },
                            "required": ["name"]
                        }),
                    )?,
                    tool(
                        "get_issue_comments",
                        "All comments on an issue, oldest first",
                        json!({
                            "type": "object",
                            "properties": { "identifier": { "type": "string" } },
                            "required": ["identifier"]
                        }),
                    )?,
                    tool(
                        "get_summary",
                        "Counts of cached teams, users, states, issues and comments",
                        json!({ "type": "object", "properties": {}, "required": [] }),
                    )?,
                ];
                let result = ListToolsResult {
                    tools,
                    next_cursor: None,
                };
                serde_json::to_value(result).map_err(|e| internal(e))
            }
            "tools/call" => {
                let req: CallToolRequest = params
                    .and_then(|v| serde_json::from_value(v).ok())
                    .ok_or(McpError::protocol(ErrorCode::InvalidParams, "Missing params"))?;

                let payload =
                    self.call_tool(&req.name, req.arguments.unwrap_or_else(|| json!({})))?;
                let text = serde_json::to_string_pretty(&payload).map_err(|e| internal(e))?;

                let result = ToolResult {
                    content: Vec::new(),
                    structured_content: Some(
                        serde_json::to_value(vec![json!({
                            "type": "text",
                            "text": text
                        })])
                        .map_err(|e| internal(e))?,
                    ),
                };
                serde_json::to_value(result).map_err(|e| internal(e))
            }
            _ => Err(McpError::protocol(
                ErrorCode::MethodNotFound,
                method.to_string(),
            )),
        }
    }
}
