//! Execution of the external call-graph tool.
//!
//! Builds a deterministic argument vector from structured flags and runs the
//! executable to completion, capturing its output. The `ProcessInvoker` trait
//! is the seam between the dispatcher and the operating system.

use std::io;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::errors::{Code2FlowError, Result};

/// Structured flags passed to the external tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationFlags {
    /// Bare switches emitted right after the executable (e.g. `--version`).
    pub switches: Vec<String>,
    pub language: Option<String>,
    pub exclude: Vec<String>,
    pub include: Vec<String>,
    pub output: Option<PathBuf>,
}

/// A single completed run of the external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalToolInvocation {
    pub argv: Vec<String>,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExternalToolInvocation {
    /// Returns true when the tool exited with status 0.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Converts a failed run into `ToolExecutionFailed`, carrying stderr.
    fn into_failure(self, executable: &str) -> Code2FlowError {
        let status = match self.exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        };
        let diagnostic = self.stderr.trim();
        let message = if diagnostic.is_empty() {
            status
        } else {
            format!("{}: {}", status, diagnostic)
        };
        Code2FlowError::ToolExecutionFailed {
            executable: executable.to_string(),
            exit_code: self.exit_code,
            message,
        }
    }
}

/// Runs a fully built command line and reports how it went.
///
/// Implementations return `Ok` whenever the process ran, regardless of its
/// exit status. Failing to start it at all is an error: `ToolUnavailable` when
/// the program cannot be found, `ToolExecutionFailed` otherwise.
///
/// `run` blocks; call it from a blocking context (e.g. `spawn_blocking`).
pub trait ProcessInvoker: Send + Sync {
    fn run(&self, argv: &[String]) -> Result<ExternalToolInvocation>;
}

/// Builds the argument vector for the external tool.
///
/// Order: executable, switches, `--language`, each `--exclude`, each
/// `--include`, `--output`, then the positional paths.
pub fn build_argv(executable: &str, flags: &InvocationFlags, positional: &[String]) -> Vec<String> {
    let mut argv = vec![executable.to_string()];
    argv.extend(flags.switches.iter().cloned());

    if let Some(language) = &flags.language {
        argv.push("--language".to_string());
        argv.push(language.clone());
    }
    for pattern in &flags.exclude {
        argv.push("--exclude".to_string());
        argv.push(pattern.clone());
    }
    for pattern in &flags.include {
        argv.push("--include".to_string());
        argv.push(pattern.clone());
    }
    if let Some(output) = &flags.output {
        argv.push("--output".to_string());
        argv.push(output.to_string_lossy().into_owned());
    }

    argv.extend(positional.iter().cloned());
    argv
}

/// Builds the command line, runs it, and maps a non-zero exit to an error.
pub fn invoke(
    invoker: &dyn ProcessInvoker,
    executable: &str,
    flags: &InvocationFlags,
    positional: &[String],
) -> Result<ExternalToolInvocation> {
    let argv = build_argv(executable, flags, positional);
    debug!(?argv, "invoking external tool");

    let invocation = invoker.run(&argv)?;
    if invocation.succeeded() {
        Ok(invocation)
    } else {
        Err(invocation.into_failure(executable))
    }
}

/// Runs the tool as a real child process.
#[derive(Debug, Clone, Default)]
pub struct SystemInvoker {
    timeout: Option<Duration>,
}

impl SystemInvoker {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Spawns the child and waits for it, bounded by the configured timeout.
    ///
    /// The child is killed when its future is dropped, which is what happens
    /// when the timeout fires.
    async fn wait_for_output(&self, program: &str, mut command: Command) -> Result<Output> {
        let child = command.spawn().map_err(|e| spawn_error(program, e))?;

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| Code2FlowError::ToolExecutionFailed {
                    executable: program.to_string(),
                    exit_code: None,
                    message: format!("timed out after {:?}", timeout),
                })?,
            None => child.wait_with_output().await,
        };

        output.map_err(|e| Code2FlowError::ToolExecutionFailed {
            executable: program.to_string(),
            exit_code: None,
            message: format!("failed while waiting for output: {}", e),
        })
    }
}

impl ProcessInvoker for SystemInvoker {
    fn run(&self, argv: &[String]) -> Result<ExternalToolInvocation> {
        let (program, args) = argv.split_first().ok_or_else(|| Code2FlowError::InvalidArgument {
            name: "argv".to_string(),
            message: "empty command line".to_string(),
        })?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let output = runtime.block_on(self.wait_for_output(program, command))?;

        debug!(program = %program, exit_code = ?output.status.code(), "external tool finished");
        Ok(ExternalToolInvocation {
            argv: argv.to_vec(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn spawn_error(program: &str, err: io::Error) -> Code2FlowError {
    if err.kind() == io::ErrorKind::NotFound {
        Code2FlowError::ToolUnavailable {
            executable: program.to_string(),
        }
    } else {
        Code2FlowError::ToolExecutionFailed {
            executable: program.to_string(),
            exit_code: None,
            message: format!("failed to start: {}", err),
        }
    }
}
