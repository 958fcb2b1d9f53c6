//! MCP (Model Context Protocol) surface for code2flow.
//!
//! Provides a JSON-RPC 2.0 interface over stdio so that AI assistants can
//! generate call graphs, check the installed code2flow, and read the
//! resulting images as resources.

/// MCP server implementation.
pub mod server;

/// Tool definitions and result envelopes.
pub mod tools;

/// JSON-RPC 2.0 transport types.
pub mod transport;

pub use server::McpServer;
pub use tools::{get_tool_definitions, to_call_result, ToolDefinition};
pub use transport::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
