/*!
The hidden `mcp` subcommand group a host binary mounts next to its own
commands.

  <host> mcp serve                  serve the tree as MCP tools on stdio
  <host> mcp tools [--json]         print the generated tool catalog
  <host> mcp call <TOOL> [--param K=V ...] [--param-file F] [--json]

Config flags (`--config`, `--mode`, `--prefix`, `--timeout-ms`) are global to
the group; values given on the command line override the config file.

Layout:
  mod.rs     McpCli / McpCommand, mcp_command(), run()
  serve.rs   ServeArgs + execute_serve
  tools.rs   ToolsArgs + execute_tools
  call.rs    CallArgs  + execute_call
  shared.rs  param parsing / coercion
  format.rs  human output helpers
*/

pub mod call;
pub mod format;
pub mod serve;
pub mod shared;
pub mod tools;

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};

pub use call::{CallArgs, execute_call};
pub use serve::{ServeArgs, execute_serve};
pub use tools::{ToolsArgs, execute_tools};

use crate::bridge::ToolBridge;
use crate::config::{ExecutionMode, ServerConfig};
use crate::tree::CommandTree;
use crate::utils;

/// Name of the mounted subcommand group.
pub const MCP_COMMAND: &str = "mcp";

#[derive(Parser, Debug)]
#[command(
    name = "mcp",
    about = "Expose this command line as MCP tools",
    disable_help_subcommand = true
)]
pub struct McpCli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: McpCommand,
}

#[derive(Subcommand, Debug)]
pub enum McpCommand {
    /// Serve the command tree over MCP on stdin/stdout
    Serve(ServeArgs),

    /// List the generated tools
    Tools(ToolsArgs),

    /// Run one tool and print its result
    Call(CallArgs),
}

/// Server configuration sources shared by every `mcp` subcommand.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Load server config from a JSON or YAML file
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Execution mode
    #[arg(long, value_enum, global = true)]
    pub mode: Option<ExecutionMode>,

    /// Tool name prefix (defaults to the root command name)
    #[arg(long, value_name = "PREFIX", global = true)]
    pub prefix: Option<String>,

    /// Kill subprocess calls after this many milliseconds
    #[arg(long = "timeout-ms", value_name = "MS", global = true)]
    pub timeout_ms: Option<u64>,
}

impl ConfigArgs {
    /// File config (or defaults) with command-line overrides applied.
    pub fn resolve(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load_from(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(mode) = self.mode {
            config.execution_mode = mode;
        }
        if let Some(prefix) = &self.prefix {
            config.tool_prefix = prefix.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = Some(ms);
        }
        Ok(config)
    }
}

/// The `mcp` group as a clap command, hidden from the host's help and from
/// tool discovery.
pub fn mcp_command() -> clap::Command {
    McpCli::command().hide(true)
}

/// True when `argv` (without the binary name) targets the `mcp` group.
pub fn is_mcp_invocation<S: AsRef<str>>(argv: &[S]) -> bool {
    argv.first().is_some_and(|a| a.as_ref() == MCP_COMMAND)
}

/// Parse `argv` (the tokens after `mcp`) and run the chosen subcommand
/// against `tree`.
pub fn run<I, S>(tree: CommandTree, argv: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let cli = McpCli::parse_from(
        std::iter::once(OsString::from(MCP_COMMAND)).chain(argv.into_iter().map(Into::into)),
    );
    utils::init_logging(utils::derive_level(cli.verbose, cli.quiet));

    let config = cli.config.resolve()?;
    let bridge = ToolBridge::new(tree, config);
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    match cli.command {
        McpCommand::Serve(args) => rt.block_on(execute_serve(bridge, args)),
        McpCommand::Tools(args) => execute_tools(&bridge, args),
        McpCommand::Call(args) => rt.block_on(execute_call(&bridge, args)),
    }
}
