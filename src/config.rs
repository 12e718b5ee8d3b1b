//! Server configuration: tool prefix, execution mode, whitelists and the
//! advisory dangerous-command list.
//!
//! Loadable from JSON or YAML; CLI flags override file values.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a resolved command is executed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Call the handler directly inside the serving process.
    #[value(name = "in-process")]
    InProcess,
    /// Re-invoke the current executable for every call.
    #[default]
    #[value(name = "sub-process")]
    SubProcess,
    /// Spawn only for handlers that can terminate the process.
    Auto,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::InProcess => "in-process",
            ExecutionMode::SubProcess => "sub-process",
            ExecutionMode::Auto => "auto",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-process" => Ok(ExecutionMode::InProcess),
            "sub-process" => Ok(ExecutionMode::SubProcess),
            "auto" => Ok(ExecutionMode::Auto),
            other => Err(Error::Config(format!(
                "invalid execution mode '{other}' (expected in-process, sub-process or auto)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Server name reported to MCP clients.
    pub name: String,
    /// Server version reported to MCP clients.
    pub version: String,
    /// Tool names are `{tool_prefix}_{action}`. Empty means the root command name.
    pub tool_prefix: String,
    pub execution_mode: ExecutionMode,
    /// Explicit action whitelist. `None` classifies automatically.
    pub actions: Option<Vec<String>>,
    /// Explicit standalone command list. `None` classifies automatically.
    pub standalone: Option<Vec<String>>,
    /// Advisory only; surfaced to clients, never enforced here.
    pub dangerous_commands: Vec<String>,
    /// Kill subprocess invocations running longer than this.
    pub timeout_ms: Option<u64>,
    /// Cap on concurrently running subprocess invocations.
    pub max_concurrent_subprocesses: Option<usize>,
    /// Executable re-invoked for subprocess calls. Defaults to the current executable.
    pub program: Option<PathBuf>,
    /// Swap process stdout/stderr during in-process calls to catch stray writes.
    pub intercept_streams: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            tool_prefix: String::new(),
            execution_mode: ExecutionMode::default(),
            actions: None,
            standalone: None,
            dangerous_commands: Vec::new(),
            timeout_ms: None,
            max_concurrent_subprocesses: None,
            program: None,
            intercept_streams: true,
        }
    }
}

impl ServerConfig {
    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let config: ServerConfig = if ext == "yaml" || ext == "yml" {
            serde_yaml::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid YAML in {}: {e}", path.display())))?
        } else {
            serde_json::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid JSON in {}: {e}", path.display())))?
        };
        tracing::debug!(path = %path.display(), "loaded server config");
        Ok(config)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tool_prefix = prefix.into();
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Fill the prefix from the root command name when unset.
    pub(crate) fn normalized(mut self, root_name: &str) -> Self {
        if self.tool_prefix.trim().is_empty() {
            self.tool_prefix = root_name.to_string();
        }
        self.tool_prefix = sanitize_tool_token(&self.tool_prefix);
        self
    }
}

/// Keep only characters MCP clients accept in tool names.
pub(crate) fn sanitize_tool_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn mode_parses_all_spellings() {
        assert_eq!("in-process".parse::<ExecutionMode>().unwrap(), ExecutionMode::InProcess);
        assert_eq!("SUB-PROCESS".parse::<ExecutionMode>().unwrap(), ExecutionMode::SubProcess);
        assert_eq!(" auto ".parse::<ExecutionMode>().unwrap(), ExecutionMode::Auto);
        assert!("threads".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn default_mode_is_isolated() {
        assert_eq!(ServerConfig::default().execution_mode, ExecutionMode::SubProcess);
    }

    #[test]
    fn load_yaml_config() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "tool_prefix: demo\nexecution_mode: auto\nactions: [list, create]\ndangerous_commands: [delete]"
        )
        .unwrap();
        let cfg = ServerConfig::load_from(file.path()).unwrap();
        assert_eq!(cfg.tool_prefix, "demo");
        assert_eq!(cfg.execution_mode, ExecutionMode::Auto);
        assert_eq!(cfg.actions, Some(vec!["list".to_string(), "create".to_string()]));
        assert_eq!(cfg.dangerous_commands, vec!["delete".to_string()]);
        assert!(cfg.intercept_streams);
    }

    #[test]
    fn load_json_config_rejects_unknown_keys() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "tool_prefix": "x", "bogus": 1 }}"#).unwrap();
        let err = ServerConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn normalized_prefix_falls_back_to_root() {
        let cfg = ServerConfig::default().normalized("my cli");
        assert_eq!(cfg.tool_prefix, "my_cli");
    }
}
