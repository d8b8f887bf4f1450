//! MCP tool handlers.

pub mod shell;
