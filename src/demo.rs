//! Sample host CLI used by the bundled `clap-mcp-demo` binary and the tests.
//!
//! Layout:
//!   demo create cluster --name --region --size
//!   demo delete cluster [--name]
//!   demo list clusters | list nodes [FILTER]...
//!   demo version
//!   demo crash            (terminating handler: prints "boom" to stderr, exits 2)
//!   demo fail             (reports an error after partial output)
//!   demo noisy            (writes to the structured writer and raw stdout/stderr)
//!   demo internal debug   (hidden)

use std::io::Write;

use anyhow::bail;
use clap::{Arg, ArgAction, Command};

use crate::tree::{CommandTree, Handler};

pub fn demo_command() -> Command {
    Command::new("demo")
        .about("Demo cluster manager exposed over MCP")
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .global(true)
                .help("Output format: Json or Table"),
        )
        .subcommand(
            Command::new("create").about("Create resources").subcommand(
                Command::new("cluster")
                    .about("Create a cluster")
                    .long_about("Create a new cluster with the specified name, region, and size.")
                    .arg(
                        Arg::new("name")
                            .long("name")
                            .required(true)
                            .help("The unique name of the cluster"),
                    )
                    .arg(
                        Arg::new("region")
                            .long("region")
                            .required(true)
                            .help("Use a specific AWS region (such as us-east-1)"),
                    )
                    .arg(
                        Arg::new("size")
                            .long("size")
                            .required(true)
                            .help("Cluster size: Small, Medium, or Large (required)"),
                    )
                    .arg(
                        Arg::new("tag")
                            .long("tag")
                            .action(ArgAction::Append)
                            .help("Tags to attach"),
                    ),
            ),
        )
        .subcommand(
            Command::new("delete").about("Delete resources").subcommand(
                Command::new("cluster")
                    .about("Delete a cluster")
                    .arg(Arg::new("name").long("name").help("Cluster to delete"))
                    .arg(
                        Arg::new("force")
                            .long("force")
                            .action(ArgAction::SetTrue)
                            .help("Skip confirmation"),
                    ),
            ),
        )
        .subcommand(
            Command::new("list")
                .about("List resources")
                .subcommand(Command::new("clusters").about("List clusters"))
                .subcommand(
                    Command::new("nodes")
                        .about("List nodes")
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(clap::value_parser!(u32))
                                .help("Maximum number of nodes"),
                        )
                        .arg(Arg::new("filter").num_args(0..).help("Name filters")),
                ),
        )
        .subcommand(Command::new("version").about("Print the version number"))
        .subcommand(Command::new("crash").about("Exit the process with status 2"))
        .subcommand(Command::new("fail").about("Report an error after partial output"))
        .subcommand(Command::new("noisy").about("Write through every output channel"))
        .subcommand(
            Command::new("internal")
                .hide(true)
                .subcommand(Command::new("debug").about("Internal diagnostics")),
        )
}

pub const CLUSTERS_JSON: &str = r#"[{"id":"cluster-123","name":"my-cluster","status":"ready"}]"#;
pub const VERSION_LINE: &str = "demo v1.0.0";

/// Attach the demo handlers to `tree`.
pub fn attach_handlers(tree: CommandTree) -> CommandTree {
    tree.handler(
        &["create", "cluster"],
        Handler::fallible(|inv, out| {
            let name = inv.flag_str("name").unwrap_or_default();
            let region = inv.flag_str("region").unwrap_or_default();
            let size = inv.flag_str("size").unwrap_or_default();
            if !matches!(size, "Small" | "Medium" | "Large") {
                bail!("size must be one of: Small, Medium, Large");
            }
            let tags: Vec<&String> = inv
                .matches
                .get_many::<String>("tag")
                .map(|v| v.collect())
                .unwrap_or_default();
            let body = serde_json::json!({
                "id": "cluster-123",
                "name": name,
                "region": region,
                "size": size,
                "tags": tags,
                "status": "creating",
            });
            writeln!(out, "{body}")?;
            Ok(())
        }),
    )
    .handler(
        &["delete", "cluster"],
        Handler::fallible(|inv, out| {
            let name = inv.flag_str("name").unwrap_or("unnamed");
            writeln!(
                out,
                r#"{{"status":"deleted","name":"{name}","force":{}}}"#,
                inv.flag_bool("force")
            )?;
            Ok(())
        }),
    )
    .handler(
        &["list", "clusters"],
        Handler::fallible(|_, out| {
            writeln!(out, "{CLUSTERS_JSON}")?;
            Ok(())
        }),
    )
    .handler(
        &["list", "nodes"],
        Handler::fallible(|inv, out| {
            let limit = inv
                .matches
                .get_one::<u32>("limit")
                .copied()
                .unwrap_or(u32::MAX) as usize;
            let nodes = ["node-a", "node-b", "node-c"];
            for node in nodes
                .iter()
                .filter(|n| inv.args.is_empty() || inv.args.iter().any(|f| n.contains(f.as_str())))
                .take(limit)
            {
                writeln!(out, "{node}")?;
            }
            Ok(())
        }),
    )
    .handler(
        &["version"],
        Handler::fallible(|_, out| {
            writeln!(out, "{VERSION_LINE}")?;
            Ok(())
        }),
    )
    .handler(
        &["crash"],
        Handler::terminating(|_, _| {
            eprintln!("boom");
            std::process::exit(2);
        }),
    )
    .handler(
        &["fail"],
        Handler::fallible(|_, out| {
            writeln!(out, "partial")?;
            bail!("boom")
        }),
    )
    .handler(
        &["noisy"],
        Handler::fallible(|_, out| {
            writeln!(out, "structured-1")?;
            let mut raw = std::io::stdout();
            raw.write_all(b"direct-1\n")?;
            raw.flush()?;
            writeln!(out, "structured-2")?;
            eprintln!("noise on stderr");
            Ok(())
        }),
    )
    .handler(
        &["internal", "debug"],
        Handler::fallible(|_, out| {
            writeln!(out, "debug")?;
            Ok(())
        }),
    )
}

/// The full demo tree with handlers.
pub fn demo_tree() -> CommandTree {
    attach_handlers(CommandTree::new(demo_command()))
}
