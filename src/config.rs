//! Configuration management for the Todo MCP server and client
//!
//! Settings come from environment variables with defaults; the binaries let
//! command-line flags override them.

use std::path::PathBuf;
use std::time::Duration;

use validator::Validate;

use crate::error::{ConfigError, Result};

/// Environment variable names
pub mod env {
    pub const SERVER_NAME: &str = "TODO_MCP_SERVER_NAME";
    pub const BIND: &str = "TODO_MCP_BIND";
    pub const SERVER_COMMAND: &str = "TODO_MCP_SERVER_COMMAND";
    pub const REQUEST_TIMEOUT_SECS: &str = "TODO_MCP_REQUEST_TIMEOUT_SECS";
}

pub const DEFAULT_SERVER_NAME: &str = "TodoMCP";
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Server binary looked up next to the running executable
const SERVER_BINARY: &str = "todo-mcp-server";

/// Configuration shared by the server and client binaries
#[derive(Debug, Clone, Validate)]
pub struct Config {
    /// Name reported in the initialize handshake
    #[validate(length(min = 1, max = 128))]
    pub server_name: String,

    /// TCP listen/connect address
    #[validate(length(min = 1))]
    pub bind_addr: String,

    /// Server program the client spawns for stdio sessions
    pub server_command: PathBuf,

    /// Per-call client timeout; `None` disables it
    #[validate(range(min = 1, max = 3600))]
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn new() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_name =
            lookup(env::SERVER_NAME).unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());

        let bind_addr = lookup(env::BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());

        let server_command = lookup(env::SERVER_COMMAND)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_server_command);

        let request_timeout_secs = match lookup(env::REQUEST_TIMEOUT_SECS) {
            None => Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(secs),
                Err(e) => {
                    return Err(ConfigError::InvalidValue {
                        var: env::REQUEST_TIMEOUT_SECS.to_string(),
                        message: e.to_string(),
                    }
                    .into())
                }
            },
        };

        let config = Self {
            server_name,
            bind_addr,
            server_command,
            request_timeout_secs,
        };
        config.validate().map_err(ConfigError::from)?;
        Ok(config)
    }

    /// The server binary built alongside the current executable, falling
    /// back to a `PATH` lookup
    fn default_server_command() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(SERVER_BINARY)))
            .filter(|candidate| candidate.exists())
            .unwrap_or_else(|| PathBuf::from(SERVER_BINARY))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TodoMcpError;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server_name, "TodoMCP");
        assert_eq!(config.bind_addr, "127.0.0.1:8000");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (env::SERVER_NAME, "Chores"),
            (env::BIND, "0.0.0.0:9000"),
            (env::SERVER_COMMAND, "/opt/bin/todo-mcp-server"),
            (env::REQUEST_TIMEOUT_SECS, "0"),
        ]))
        .unwrap();

        assert_eq!(config.server_name, "Chores");
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.server_command, PathBuf::from("/opt/bin/todo-mcp-server"));
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[(env::REQUEST_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(matches!(err, TodoMcpError::Config(ConfigError::InvalidValue { .. })));

        let err = Config::from_lookup(lookup(&[(env::REQUEST_TIMEOUT_SECS, "7200")])).unwrap_err();
        assert!(matches!(err, TodoMcpError::Config(ConfigError::Validation(_))));

        let err = Config::from_lookup(lookup(&[(env::SERVER_NAME, "")])).unwrap_err();
        assert!(matches!(err, TodoMcpError::Config(ConfigError::Validation(_))));
    }
}
