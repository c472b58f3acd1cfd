//! Plain-text extraction from rich-text comment bodies
//!
//! Comment bodies are stored as tree-structured rich-text documents,
//! sometimes JSON-encoded into a string. Extraction is total: anything
//! that fails to parse degrades to the raw input, and unrecognized node
//! shapes contribute nothing rather than erroring.

use serde_json::Value;

/// Extract plain text from a raw comment body value.
///
/// Accepts either a parsed document tree or a string that may contain a
/// JSON-encoded tree. A string that is not valid JSON is returned as-is.
pub fn extract_body(body: &Value) -> String {
    match body {
        Value::Null => String::new(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) => extract_node(&parsed),
            Err(_) => s.clone(),
        },
        other => extract_node(other),
    }
}

/// Recursively concatenate the text content of a document node.
fn extract_node(node: &Value) -> String {
    match node {
        Value::Object(map) => {
            let node_type = map.get("type").and_then(Value::as_str).unwrap_or("");
            match node_type {
                "text" => map
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                "suggestion_userMentions" => {
                    let label = map
                        .get("attrs")
                        .and_then(|a| a.get("label"))
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    if label.is_empty() {
                        String::new()
                    } else {
                        format!("@{label}")
                    }
                }
                "hardBreak" => "\n".to_string(),
                _ => match map.get("content") {
                    Some(Value::Array(children)) => {
                        children.iter().map(extract_node).collect()
                    }
                    _ => String::new(),
                },
            }
        }
        Value::Array(children) => children.iter().map(extract_node).collect(),
        _ => String::new(),
    }
}
