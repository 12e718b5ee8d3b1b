//! Expose a clap command tree as MCP tools.
//!
//! The tree is discovered once, classified into action tools
//! (`{prefix}_{verb}` taking a `resource`) and standalone tools, and served
//! over stdio with `rmcp`. Each call is validated against the discovered
//! flags, serialized back to argv and run either in-process or by
//! re-invoking the host binary.
//!
//! ```no_run
//! use clap_mcp::{ServerConfig, ToolBridge, cmd, demo};
//!
//! let tree = demo::demo_tree().with_subcommand(cmd::mcp_command());
//! let bridge = ToolBridge::new(tree, ServerConfig::default());
//! for tool in bridge.list_tools() {
//!     println!("{}", tool.name);
//! }
//! ```

pub mod bridge;
pub mod catalog;
pub mod cmd;
pub mod config;
pub mod demo;
pub mod discover;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod mcp;
pub mod tree;
pub mod utils;

pub use bridge::{ToolBridge, ToolResponse};
pub use catalog::{Catalog, ToolDefinition};
pub use config::{ExecutionMode, ServerConfig};
pub use error::{Error, Result};
pub use exec::ExecuteResult;
pub use tree::{CommandTree, Handler, Invocation};
