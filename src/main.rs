//! Issuelens CLI - read-only queries over a project tracker's local cache

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use issuelens::config;
use issuelens::query::{IssueFilter, QueryEngine};
use issuelens::server::McpService;
use issuelens::snapshot::SnapshotCache;
use issuelens::store::SqliteRawStore;

#[derive(Parser)]
#[command(name = "issuelens")]
#[command(version)]
#[command(about = "Fast, read-only queries over a project tracker's local cache")]
#[command(long_about = r#"
Issuelens reads the tracker's locally cached data without any network
calls, enabling:
  • Issue lookup, title search and filtered listings
  • Fuzzy user and team resolution
  • Per-user issue reports with per-state counts
  • An MCP stdio server exposing the same operations as tools

Example usage:
  issuelens --db ~/tracker/cache.db summary
  issuelens --db ~/tracker/cache.db search --query "login"
  issuelens --db ~/tracker/cache.db serve
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the tracker cache database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to the tracker's blob sidecar directory
    #[arg(long, global = true)]
    blob: Option<PathBuf>,

    /// Path to issuelens.toml (defaults to the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP stdio server
    Serve,

    /// Show counts of cached entities
    Summary,

    /// Show which cache tables were detected for each entity kind
    Detect,

    /// Search issues by title
    Search {
        /// Search query (case-insensitive substring)
        #[arg(short, long)]
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show a single issue by identifier (e.g. 'ENG-142')
    Issue {
        identifier: String,
    },

    /// List issues with optional filters
    Issues {
        /// Filter by assignee name (partial match)
        #[arg(long)]
        assignee: Option<String>,

        /// Filter by team key or name
        #[arg(long)]
        team: Option<String>,

        /// Filter by state type (backlog, unstarted, started, completed, canceled)
        #[arg(long)]
        state_type: Option<String>,

        /// Filter by priority (1=Urgent, 2=High, 3=Normal, 4=Low)
        #[arg(long)]
        priority: Option<i64>,

        /// Only issues updated after this ISO-8601 datetime
        #[arg(long)]
        updated_after: Option<String>,

        /// Maximum number of issues per page
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Pagination cursor (issue id to resume after)
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Report one user's issues with per-state counts
    MyIssues {
        /// User name (partial match)
        #[arg(short, long)]
        name: String,

        /// Filter by state type
        #[arg(long)]
        state_type: Option<String>,

        /// Only issues updated after this ISO-8601 datetime
        #[arg(long)]
        updated_after: Option<String>,

        /// Maximum number of issues per page
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Pagination cursor (issue id to resume after)
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Show all comments on an issue
    Comments {
        identifier: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = config::load_config(cli.config.as_deref())?;
    let settings = config::resolve_settings(config.as_ref(), cli.db, cli.blob)?;

    let store = SqliteRawStore::open(&settings.db_path, settings.blob_path.as_deref())?;
    let cache = Arc::new(SnapshotCache::with_ttl(Box::new(store), settings.ttl));
    let engine = QueryEngine::new(&cache);

    match cli.command {
        Commands::Serve => {
            tracing::info!("Serving MCP over stdio (cache: {:?})", settings.db_path);
            let service = McpService::new(Arc::clone(&cache));
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(service.run_stdio())?;
        }

        Commands::Summary => {
            let summary = engine.summary()?;
            println!("📊 Cached tracker data ({:?})", settings.db_path);
            println!("   Teams:    {}", summary.teams);
            println!("   Users:    {}", summary.users);
            println!("   States:   {}", summary.states);
            println!("   Issues:   {}", summary.issues);
            println!("   Comments: {}", summary.comments);
        }

        Commands::Detect => {
            let tables = cache.tables()?;
            println!("🔎 Detected table roles:");
            println!("   issues:          {}", tables.issues.as_deref().unwrap_or("∅"));
            println!("   teams:           {}", tables.teams.as_deref().unwrap_or("∅"));
            println!("   users:           {}", format_list(&tables.users));
            println!("   workflow states: {}", format_list(&tables.workflow_states));
            println!("   comments:        {}", tables.comments.as_deref().unwrap_or("∅"));
            println!("   projects:        {}", tables.projects.as_deref().unwrap_or("∅"));
        }

        Commands::Search { query, limit } => {
            let hits = engine.search_titles(&query, limit)?;
            if hits.is_empty() {
                println!("∅ No issues match '{}'.", query);
            } else {
                for issue in hits {
                    println!("- {} {}", issue.identifier, issue.title);
                }
            }
        }

        Commands::Issue { identifier } => match engine.issue_by_identifier(&identifier)? {
            Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
            None => println!("∅ No issue '{}' found.", identifier),
        },

        Commands::Issues {
            assignee,
            team,
            state_type,
            priority,
            updated_after,
            limit,
            cursor,
        } => {
            let filter = IssueFilter {
                assignee,
                team,
                state_type,
                priority,
                updated_after: updated_after.map(Value::String),
            };
            let page = engine.list_issues(&filter, limit, cursor.as_deref())?;
            println!("📋 {} matching issue(s)", page.total_count);
            for view in &page.issues {
                let priority = view
                    .issue
                    .priority
                    .map_or("-".to_string(), |p| format!("P{p}"));
                println!(
                    "- [{}] {} {} ({})",
                    priority, view.issue.identifier, view.issue.title, view.state
                );
            }
            if let Some(cursor) = page.next_cursor {
                println!("… more available, resume with --cursor {}", cursor);
            }
        }

        Commands::MyIssues {
            name,
            state_type,
            updated_after,
            limit,
            cursor,
        } => {
            let updated_after = updated_after.map(Value::String);
            let report = engine.my_issues(
                &name,
                state_type.as_deref(),
                updated_after.as_ref(),
                limit,
                cursor.as_deref(),
            )?;
            println!(
                "👤 {} <{}> - {} issue(s)",
                report.user.name, report.user.email, report.total_issues
            );
            for (state_type, count) in &report.counts_by_state_type {
                println!("   {}: {}", state_type, count);
            }
            for issue in &report.issues {
                let priority = issue.priority.map_or("-".to_string(), |p| format!("P{p}"));
                println!(
                    "- [{}] {} {} ({})",
                    priority, issue.identifier, issue.title, issue.state
                );
            }
            if let Some(cursor) = report.next_cursor {
                println!("… more available, resume with --cursor {}", cursor);
            }
        }

        Commands::Comments { identifier } => {
            let thread = engine.issue_comments(&identifier)?;
            println!(
                "💬 {} comment(s) on {} {}",
                thread.comment_count, thread.issue.identifier, thread.issue.title
            );
            for comment in &thread.comments {
                println!("-- {} --", comment.author);
                println!("{}", comment.body);
            }
        }
    }

    Ok(())
}

fn format_list(names: &[String]) -> String {
    if names.is_empty() {
        "∅".to_string()
    } else {
        names.join(", ")
    }
}
