//! Query operations over the snapshot cache
//!
//! [`engine::QueryEngine`] implements lookup, fuzzy matching, filtering,
//! sorting and keyset pagination; [`time`] handles the tracker's mixed
//! timestamp representations.

pub mod engine;
pub mod time;

pub use engine::{
    CommentThread, IssueFilter, IssuePage, IssueView, MyIssues, QueryEngine, SearchPage, Summary,
};
