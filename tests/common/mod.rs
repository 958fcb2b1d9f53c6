#![allow(dead_code)]

use std::fs;
use std::sync::{Arc, Mutex};

use code2flow_mcp::config::ServerConfig;
use code2flow_mcp::dispatcher::ToolDispatcher;
use code2flow_mcp::errors::{Code2FlowError, Result};
use code2flow_mcp::invoker::{ExternalToolInvocation, ProcessInvoker};
use code2flow_mcp::registry::ResourceRegistry;

/// First bytes of every PNG file.
pub const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// What the stub does when run.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Writes a PNG at the `--output` path and exits 0.
    WritePng,
    /// Exits 0 with the given stdout and writes nothing.
    Stdout(String),
    /// Exits with `code` and the given stderr.
    Fail { code: i32, stderr: String },
    /// Behaves as if the executable does not exist.
    NotFound,
}

/// A `ProcessInvoker` that records every command line instead of spawning.
#[derive(Debug, Clone)]
pub struct StubInvoker {
    behavior: StubBehavior,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl StubInvoker {
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessInvoker for StubInvoker {
    fn run(&self, argv: &[String]) -> Result<ExternalToolInvocation> {
        self.calls.lock().unwrap().push(argv.to_vec());

        let completed = |exit_code: i32, stdout: &str, stderr: &str| ExternalToolInvocation {
            argv: argv.to_vec(),
            exit_code: Some(exit_code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        };

        match &self.behavior {
            StubBehavior::WritePng => {
                let output = argv
                    .iter()
                    .position(|a| a == "--output")
                    .and_then(|i| argv.get(i + 1))
                    .expect("stub expects --output");
                fs::write(output, PNG_SIGNATURE)?;
                Ok(completed(0, "", ""))
            }
            StubBehavior::Stdout(stdout) => Ok(completed(0, stdout, "")),
            StubBehavior::Fail { code, stderr } => Ok(completed(*code, "", stderr)),
            StubBehavior::NotFound => Err(Code2FlowError::ToolUnavailable {
                executable: argv[0].clone(),
            }),
        }
    }
}

/// Builds a dispatcher around a stub, returning the stub for inspection.
pub fn stub_dispatcher(behavior: StubBehavior) -> (ToolDispatcher, StubInvoker, Arc<ResourceRegistry>) {
    let stub = StubInvoker::new(behavior);
    let registry = Arc::new(ResourceRegistry::new());
    let dispatcher = ToolDispatcher::new(
        Box::new(stub.clone()),
        Arc::clone(&registry),
        ServerConfig::default(),
    );
    (dispatcher, stub, registry)
}
