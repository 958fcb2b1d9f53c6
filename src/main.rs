use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use code2flow_mcp::config::{load_config, ServerConfig};
use code2flow_mcp::dispatcher::ToolDispatcher;
use code2flow_mcp::mcp::{get_tool_definitions, McpServer};
use code2flow_mcp::registry::ResourceRegistry;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Call-graph generation over MCP, backed by code2flow.
#[derive(Parser)]
#[command(name = "code2flow-mcp", version, about = "Expose code2flow as MCP tools and resources")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// code2flow executable to run (overrides the config file)
    #[arg(short, long, global = true)]
    executable: Option<String>,
    /// Kill code2flow after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Log filter used when RUST_LOG is unset (e.g. info, debug)
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdin/stdout (default)
    Serve,
    /// Print the installed code2flow version
    Check,
    /// Print the tool definitions as JSON
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> code2flow_mcp::errors::Result<()> {
    let config = resolve_config(&cli)?;
    init_logging(&config.log_level);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!(executable = %config.executable, "starting code2flow MCP server");
            let registry = Arc::new(ResourceRegistry::new());
            let server = McpServer::new(ToolDispatcher::with_system_invoker(registry, config));
            server.run().await?;
        }
        Commands::Check => {
            let dispatcher =
                ToolDispatcher::with_system_invoker(Arc::new(ResourceRegistry::new()), config);
            let result =
                tokio::task::spawn_blocking(move || dispatcher.check_code2flow_version()).await?;
            if let Some(message) = result.error_message() {
                eprintln!("{}", message);
                process::exit(1);
            }
            let version = result
                .field("version")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            println!("code2flow {}", version);
        }
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&get_tool_definitions())?);
        }
    }
    Ok(())
}

/// Loads the config file and applies command-line overrides.
fn resolve_config(cli: &Cli) -> code2flow_mcp::errors::Result<ServerConfig> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(executable) = &cli.executable {
        config.executable = executable.clone();
    }
    if let Some(timeout) = cli.timeout_secs {
        config.timeout_secs = Some(timeout);
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

/// Logs go to stderr; stdout carries protocol messages.
fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}
