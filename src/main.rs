use anyhow::Result;

use clap_mcp::{cmd, demo};

/// clap-mcp-demo - sample cluster CLI that can serve itself over MCP
///
/// Regular use runs the demo commands directly:
///   clap-mcp-demo list clusters
///   clap-mcp-demo create cluster --name c1 --region eu --size Small
///
/// The hidden `mcp` group exposes the same tree as tools:
///   clap-mcp-demo mcp serve [--mode auto|in-process|sub-process] [--prefix P] [--config F]
///   clap-mcp-demo mcp tools [--json]
///   clap-mcp-demo mcp call demo_list --param resource=clusters
///
/// In sub-process mode (the default) every tool call re-runs this binary
/// with the command's argv, so the regular path below serves those too.
///
/// Env:
///   RUST_LOG    overrides -v / -q for the mcp group
///   NO_COLOR    plain human output
fn main() -> Result<()> {
    let tree = demo::demo_tree().with_subcommand(cmd::mcp_command());

    let argv: Vec<String> = std::env::args().skip(1).collect();
    if cmd::is_mcp_invocation(&argv) {
        return cmd::run(tree, argv.into_iter().skip(1));
    }
    tree.run_from_env()
}
