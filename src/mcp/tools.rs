//! Tool definitions advertised over MCP and the shaping of tool results.
//!
//! Each definition carries a JSON Schema for its arguments so that clients can
//! discover what the server accepts.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dispatcher::{ToolName, ToolResult};

/// A tool definition exposed by the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Returns the definitions of every tool, in `ToolName::ALL` order.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.into_iter().map(tool_definition).collect()
}

fn tool_definition(tool: ToolName) -> ToolDefinition {
    let (description, input_schema) = match tool {
        ToolName::GenerateCallGraph => (
            "Generate a PNG call graph for the given source files or directories with code2flow. Returns a call-graph:// resource URI for the image.",
            json!({
                "type": "object",
                "properties": {
                    "source_paths": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "description": "Source files or directories to analyse"
                    },
                    "output_path": {
                        "type": "string",
                        "description": "Where to write the PNG (default: a fresh temporary directory)"
                    },
                    "language": {
                        "type": "string",
                        "description": "Source language, e.g. py, js, rb, php (default: auto-detect)"
                    },
                    "exclude": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Glob patterns of files or directories to skip"
                    },
                    "include": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Glob patterns of files or directories to include"
                    }
                },
                "required": ["source_paths"]
            }),
        ),
        ToolName::CheckCode2flowVersion => (
            "Report the version of the installed code2flow executable.",
            json!({
                "type": "object",
                "properties": {}
            }),
        ),
        ToolName::AnalyzeCodeComplexity => (
            "Run code2flow in analysis-only mode and return file, function and class counts (best effort) plus the raw output.",
            json!({
                "type": "object",
                "properties": {
                    "source_path": {
                        "type": "string",
                        "description": "Source file or directory to analyse"
                    },
                    "language": {
                        "type": "string",
                        "description": "Source language (default: auto-detect)"
                    }
                },
                "required": ["source_path"]
            }),
        ),
    };

    ToolDefinition {
        name: tool.as_str().to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Wraps a tool result in the MCP `tools/call` result envelope.
pub fn to_call_result(tool: Option<ToolName>, result: ToolResult) -> Value {
    let is_error = !result.is_success();
    let payload = result.into_payload(tool);
    let text = serde_json::to_string_pretty(&payload).unwrap_or_default();
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}
