use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Code2FlowError, Result};

/// Name of the configuration file looked up in the user config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Name of the directory (under the platform config dir) holding the config file.
pub const CONFIG_DIR: &str = "code2flow-mcp";

/// Runtime configuration for the server.
///
/// Every field has a default so that a partial (or absent) config file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Program name or path of the external call-graph tool.
    pub executable: String,
    /// File name used when a call does not supply an output path.
    pub default_output_name: String,
    /// Prefix for the per-call temporary directories.
    pub temp_prefix: String,
    /// Kill the external tool after this many seconds. `None` waits forever.
    pub timeout_secs: Option<u64>,
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            executable: "code2flow".to_string(),
            default_output_name: "call_graph.png".to_string(),
            temp_prefix: "code2flow-".to_string(),
            timeout_secs: None,
            log_level: "info".to_string(),
        }
    }
}

/// Returns the default config file location, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILENAME))
}

/// Loads the configuration.
///
/// An explicit path must exist. Without one, the default location is used when
/// present and built-in defaults otherwise.
pub fn load_config(explicit: Option<&Path>) -> Result<ServerConfig> {
    match explicit {
        Some(path) => read_config_file(path),
        None => match default_config_path() {
            Some(path) if path.exists() => read_config_file(&path),
            _ => Ok(ServerConfig::default()),
        },
    }
}

/// Parses a TOML config file.
pub fn read_config_file(path: &Path) -> Result<ServerConfig> {
    let contents = fs::read_to_string(path).map_err(|e| Code2FlowError::Config {
        message: format!("failed to read config file '{}': {}", path.display(), e),
    })?;

    toml::from_str(&contents).map_err(|e| Code2FlowError::Config {
        message: format!("failed to parse config file '{}': {}", path.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ServerConfig = toml::from_str("timeout_secs = 30\n").unwrap();
        assert_eq!(config.timeout_secs, Some(30));
        assert_eq!(config.executable, "code2flow");
        assert_eq!(config.default_output_name, "call_graph.png");
    }

    #[test]
    fn test_default_config_path_ends_with_filename() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("code2flow-mcp/config.toml"));
        }
    }
}
