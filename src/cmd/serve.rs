//! `mcp serve`: run the MCP server on stdio until the client disconnects.

use anyhow::Result;
use clap::Args;

use crate::bridge::ToolBridge;
use crate::config::ExecutionMode;
use crate::mcp;
use crate::utils;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Leave stdout/stderr alone during in-process calls
    #[arg(long = "no-intercept")]
    pub no_intercept: bool,
}

pub async fn execute_serve(mut bridge: ToolBridge, args: ServeArgs) -> Result<()> {
    utils::ignore_sigpipe();

    let mut config = bridge.config().clone();
    if args.no_intercept && config.intercept_streams {
        config.intercept_streams = false;
        bridge.reconfigure(config);
    }

    let config = bridge.config();
    if config.execution_mode != ExecutionMode::SubProcess && config.intercept_streams {
        // fd 1 is the protocol channel; a redirect during a call also swallows
        // whatever the transport writes in that window.
        tracing::warn!(
            mode = %config.execution_mode,
            "stream interception is on while serving over stdio; pass --no-intercept \
             if handlers only write through their output sink"
        );
    }

    mcp::serve_stdio(bridge).await
}
