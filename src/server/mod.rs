//! Protocol-facing layer
//!
//! Exposes the query operations as MCP tools over stdio. The core returns
//! plain serializable values and structured error results, so this layer
//! only dispatches and serializes.

pub mod mcp;

pub use mcp::McpService;
