use thiserror::Error;

/// Errors that can occur while orchestrating code2flow.
#[derive(Error, Debug)]
pub enum Code2FlowError {
    #[error("missing required argument: {name}")]
    MissingArgument { name: String },

    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    #[error("{executable} is not installed or could not be found on PATH")]
    ToolUnavailable { executable: String },

    #[error("{executable} failed: {message}")]
    ToolExecutionFailed {
        executable: String,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("resource not found: {uri}")]
    ResourceNotFound { uri: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Convenience alias for results using `Code2FlowError`.
pub type Result<T> = std::result::Result<T, Code2FlowError>;
