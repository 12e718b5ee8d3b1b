//! Error taxonomy for tool resolution and command execution.
//!
//! Validation errors (unknown tool / resource / flag, missing required flag,
//! command not found) are produced before anything runs. Execution errors
//! carry whatever output was captured up to the failure point.
//!
//! A handler that exits the process while running in-process has no variant
//! here: the serving process is simply gone. Use `auto` or `sub-process`
//! execution for handlers that may do that.

use std::fmt;
use std::time::Duration;

use crate::exec::ExecuteResult;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown tool: '{0}'")]
    UnknownTool(String),

    #[error("{}", unknown_resource_message(.tool, .resource.as_deref(), .expected))]
    UnknownResource {
        tool: String,
        resource: Option<String>,
        expected: Vec<String>,
    },

    #[error("{}", FlagErrors(.0))]
    InvalidFlags(Vec<FlagError>),

    #[error("command not found: '{}'", .0.join(" "))]
    CommandNotFound(Vec<String>),

    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("command '{}' failed: {}", .path.join(" "), .result.error.as_deref().unwrap_or("unknown error"))]
    CommandExecution {
        path: Vec<String>,
        result: Box<ExecuteResult>,
    },

    #[error("failed to spawn '{program}': {source}")]
    SubprocessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command cancelled: {reason}")]
    Cancelled { reason: CancelReason },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Short machine-friendly name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnknownTool(_) => "UnknownTool",
            Error::UnknownResource { .. } => "UnknownResource",
            Error::InvalidFlags(_) => "InvalidFlags",
            Error::CommandNotFound(_) => "CommandNotFound",
            Error::InvalidArguments(_) => "InvalidArguments",
            Error::CommandExecution { .. } => "CommandExecutionError",
            Error::SubprocessSpawn { .. } => "SubprocessSpawnError",
            Error::Cancelled { .. } => "Cancelled",
            Error::Config(_) => "Config",
        }
    }

    /// Flag errors carried by `InvalidFlags`, empty for every other variant.
    pub fn flag_errors(&self) -> &[FlagError] {
        match self {
            Error::InvalidFlags(errs) => errs,
            _ => &[],
        }
    }
}

fn unknown_resource_message(tool: &str, resource: Option<&str>, expected: &[String]) -> String {
    match resource {
        Some(r) => format!(
            "unknown resource '{r}' for tool '{tool}' (expected one of: {})",
            expected.join(", ")
        ),
        None => format!(
            "tool '{tool}' requires a 'resource' argument (one of: {})",
            expected.join(", ")
        ),
    }
}

/// One flag-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagError {
    Unknown(String),
    MissingRequired(String),
    InvalidValue { flag: String, reason: String },
}

impl FlagError {
    pub fn flag(&self) -> &str {
        match self {
            FlagError::Unknown(f) | FlagError::MissingRequired(f) => f,
            FlagError::InvalidValue { flag, .. } => flag,
        }
    }
}

impl fmt::Display for FlagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagError::Unknown(name) => write!(f, "UnknownFlag: '{name}'"),
            FlagError::MissingRequired(name) => write!(f, "MissingRequiredFlag: '{name}'"),
            FlagError::InvalidValue { flag, reason } => {
                write!(f, "InvalidFlagValue: '{flag}' ({reason})")
            }
        }
    }
}

struct FlagErrors<'a>(&'a [FlagError]);

impl fmt::Display for FlagErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid flags: ")?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Requested,
    TimedOut(Duration),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Requested => f.write_str("cancellation requested"),
            CancelReason::TimedOut(d) => write!(f, "timed out after {} ms", d.as_millis()),
        }
    }
}
