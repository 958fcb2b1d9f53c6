//! Tool dispatch: validates arguments, runs code2flow, and shapes results.
//!
//! Every failure is caught here and turned into `ToolResult::Failure`; nothing
//! from the child process or the filesystem escapes as an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::analysis::parse_analysis_output;
use crate::config::ServerConfig;
use crate::errors::{Code2FlowError, Result};
use crate::invoker::{invoke, InvocationFlags, ProcessInvoker, SystemInvoker};
use crate::registry::{ResourceRegistry, PNG_MIME};

/// The fixed set of tools this server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    GenerateCallGraph,
    CheckCode2flowVersion,
    AnalyzeCodeComplexity,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [
        ToolName::GenerateCallGraph,
        ToolName::CheckCode2flowVersion,
        ToolName::AnalyzeCodeComplexity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerateCallGraph => "generate_call_graph",
            Self::CheckCode2flowVersion => "check_code2flow_version",
            Self::AnalyzeCodeComplexity => "analyze_code_complexity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    /// The success payload shape with every field at its empty value.
    fn empty_payload(self) -> Map<String, Value> {
        let shape = match self {
            Self::GenerateCallGraph => json!({
                "resource_uri": null,
                "output_path": null,
                "message": null,
            }),
            Self::CheckCode2flowVersion => json!({ "version": null }),
            Self::AnalyzeCodeComplexity => json!({
                "file_count": 0,
                "function_count": 0,
                "class_count": 0,
                "raw_output": "",
            }),
        };
        match shape {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named tool invocation with its raw JSON arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(Map<String, Value>),
    Failure { message: String },
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the failure message, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { message } => Some(message.as_str()),
        }
    }

    /// Returns a field of a successful payload.
    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Success(payload) => payload.get(key),
            Self::Failure { .. } => None,
        }
    }

    /// Converts to the JSON object sent to clients.
    ///
    /// Failures keep the tool's payload shape, with empty fields and an `error`
    /// field holding the message.
    pub fn into_payload(self, tool: Option<ToolName>) -> Value {
        match self {
            Self::Success(payload) => Value::Object(payload),
            Self::Failure { message } => {
                let mut payload = tool.map(ToolName::empty_payload).unwrap_or_default();
                payload.insert("error".to_string(), Value::String(message));
                Value::Object(payload)
            }
        }
    }
}

impl From<Result<Map<String, Value>>> for ToolResult {
    fn from(result: Result<Map<String, Value>>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(e) => Self::Failure {
                message: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateCallGraphArgs {
    source_paths: Option<Vec<String>>,
    output_path: Option<String>,
    language: Option<String>,
    exclude: Option<Vec<String>>,
    include: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeCodeComplexityArgs {
    source_path: Option<String>,
    language: Option<String>,
}

/// Routes tool calls to code2flow and registers the artifacts it produces.
pub struct ToolDispatcher {
    invoker: Box<dyn ProcessInvoker>,
    registry: Arc<ResourceRegistry>,
    config: ServerConfig,
}

impl ToolDispatcher {
    pub fn new(
        invoker: Box<dyn ProcessInvoker>,
        registry: Arc<ResourceRegistry>,
        config: ServerConfig,
    ) -> Self {
        Self {
            invoker,
            registry,
            config,
        }
    }

    /// Creates a dispatcher that runs the real executable named in `config`.
    pub fn with_system_invoker(registry: Arc<ResourceRegistry>, config: ServerConfig) -> Self {
        let invoker = SystemInvoker::new(config.timeout_secs.map(Duration::from_secs));
        Self::new(Box::new(invoker), registry, config)
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Dispatches a request by tool name. Unknown names yield a failure.
    pub fn dispatch(&self, request: &ToolRequest) -> ToolResult {
        let Some(tool) = ToolName::from_name(&request.tool_name) else {
            let known: Vec<&str> = ToolName::ALL.iter().map(|t| t.as_str()).collect();
            return ToolResult::Failure {
                message: format!(
                    "unknown tool: {} (available: {})",
                    request.tool_name,
                    known.join(", ")
                ),
            };
        };

        let arguments = request.arguments.clone();
        let result = match tool {
            ToolName::GenerateCallGraph => self.generate_call_graph(arguments),
            ToolName::CheckCode2flowVersion => self.check_code2flow_version(),
            ToolName::AnalyzeCodeComplexity => self.analyze_code_complexity(arguments),
        };

        if let ToolResult::Failure { message } = &result {
            warn!(tool = %tool, %message, "tool call failed");
        }
        result
    }

    /// Renders a call graph for `source_paths` and registers the PNG.
    pub fn generate_call_graph(&self, arguments: Value) -> ToolResult {
        self.try_generate_call_graph(arguments).into()
    }

    /// Reports the installed code2flow version.
    pub fn check_code2flow_version(&self) -> ToolResult {
        self.try_check_version().into()
    }

    /// Runs code2flow in analysis-only mode and extracts what counts it can.
    pub fn analyze_code_complexity(&self, arguments: Value) -> ToolResult {
        self.try_analyze(arguments).into()
    }

    fn try_generate_call_graph(&self, arguments: Value) -> Result<Map<String, Value>> {
        let args: GenerateCallGraphArgs = parse_arguments(arguments)?;

        let source_paths = args.source_paths.unwrap_or_default();
        if source_paths.is_empty() {
            return Err(Code2FlowError::MissingArgument {
                name: "source_paths".to_string(),
            });
        }

        let output_path = match non_blank(args.output_path) {
            Some(path) => std::path::absolute(path)?,
            None => self.allocate_output_path()?,
        };

        let flags = InvocationFlags {
            switches: Vec::new(),
            language: non_blank(args.language),
            exclude: args.exclude.unwrap_or_default(),
            include: args.include.unwrap_or_default(),
            output: Some(output_path.clone()),
        };
        invoke(
            self.invoker.as_ref(),
            &self.config.executable,
            &flags,
            &source_paths,
        )?;

        if !output_path.is_file() {
            return Err(Code2FlowError::ToolExecutionFailed {
                executable: self.config.executable.clone(),
                exit_code: Some(0),
                message: format!("produced no output file at {}", output_path.display()),
            });
        }

        let resource_uri = self.registry.register(&output_path, PNG_MIME);
        info!(%resource_uri, "call graph generated");

        let mut payload = Map::new();
        payload.insert(
            "message".to_string(),
            json!(format!("Call graph generated: {}", resource_uri)),
        );
        payload.insert("resource_uri".to_string(), json!(resource_uri));
        payload.insert(
            "output_path".to_string(),
            json!(output_path.to_string_lossy()),
        );
        Ok(payload)
    }

    fn try_check_version(&self) -> Result<Map<String, Value>> {
        let flags = InvocationFlags {
            switches: vec!["--version".to_string()],
            ..Default::default()
        };
        let invocation = invoke(self.invoker.as_ref(), &self.config.executable, &flags, &[])?;

        // Older argparse versions print --version to stderr.
        let version = match invocation.stdout.trim() {
            "" => invocation.stderr.trim(),
            out => out,
        };

        let mut payload = Map::new();
        payload.insert("version".to_string(), json!(version));
        Ok(payload)
    }

    fn try_analyze(&self, arguments: Value) -> Result<Map<String, Value>> {
        let args: AnalyzeCodeComplexityArgs = parse_arguments(arguments)?;
        let source_path =
            non_blank(args.source_path).ok_or_else(|| Code2FlowError::MissingArgument {
                name: "source_path".to_string(),
            })?;

        let flags = InvocationFlags {
            switches: vec!["--analyze-only".to_string()],
            language: non_blank(args.language),
            ..Default::default()
        };
        let invocation = invoke(
            self.invoker.as_ref(),
            &self.config.executable,
            &flags,
            &[source_path],
        )?;

        let summary = parse_analysis_output(&invocation.stdout);
        let mut payload = Map::new();
        payload.insert("file_count".to_string(), json!(summary.file_count));
        payload.insert("function_count".to_string(), json!(summary.function_count));
        payload.insert("class_count".to_string(), json!(summary.class_count));
        payload.insert("raw_output".to_string(), json!(summary.raw_output));
        Ok(payload)
    }

    /// Creates a fresh directory for this call and returns the default output path in it.
    ///
    /// The directory is kept after the call so the registered graph stays readable.
    fn allocate_output_path(&self) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(&self.config.temp_prefix)
            .tempdir()?
            .keep();
        Ok(dir.join(Path::new(&self.config.default_output_name)))
    }
}

fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| Code2FlowError::InvalidArgument {
        name: "arguments".to_string(),
        message: e.to_string(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
