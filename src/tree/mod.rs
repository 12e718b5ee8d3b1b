//! Host command tree: a `clap::Command` hierarchy plus the handlers that
//! implement its runnable nodes.
//!
//! The clap tree is never mutated after construction. Every call parses its
//! own argument vector against a fresh clone of the root, so each handler
//! receives a private `ArgMatches` instead of reading flag values that a
//! previous call left behind.
//!
//! Handlers come in two shapes:
//!   - `Handler::fallible`  : returns `anyhow::Result<()>`; failures are reported
//!   - `Handler::terminating`: returns nothing and may end the process
//!     (`std::process::exit`), so it is only safe to run in a child process

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgMatches, Command};

type FallibleFn = dyn Fn(&Invocation, &mut dyn Write) -> Result<()> + Send + Sync;
type TerminatingFn = dyn Fn(&Invocation, &mut dyn Write) + Send + Sync;

/// Whether a handler can report an error or can only end the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ReportsError,
    TerminatesOnly,
}

#[derive(Clone)]
pub enum Handler {
    Fallible(Arc<FallibleFn>),
    Terminating(Arc<TerminatingFn>),
}

impl Handler {
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(&Invocation, &mut dyn Write) -> Result<()> + Send + Sync + 'static,
    {
        Handler::Fallible(Arc::new(f))
    }

    pub fn terminating<F>(f: F) -> Self
    where
        F: Fn(&Invocation, &mut dyn Write) + Send + Sync + 'static,
    {
        Handler::Terminating(Arc::new(f))
    }

    pub fn capability(&self) -> Capability {
        match self {
            Handler::Fallible(_) => Capability::ReportsError,
            Handler::Terminating(_) => Capability::TerminatesOnly,
        }
    }

    /// Run the handler. Terminating handlers that return count as success.
    pub fn call(&self, inv: &Invocation, out: &mut dyn Write) -> Result<()> {
        match self {
            Handler::Fallible(f) => f(inv, out),
            Handler::Terminating(f) => {
                f(inv, out);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handler::{:?}", self.capability())
    }
}

/// Per-call parameters handed to a handler.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Resolved command path (without the root name).
    pub path: Vec<String>,
    /// Matches of the resolved node, including propagated global flags.
    pub matches: ArgMatches,
    /// Positional arguments that followed the command path.
    pub args: Vec<String>,
}

impl Invocation {
    /// Convenience accessor for string-typed flags.
    pub fn flag_str(&self, id: &str) -> Option<&str> {
        self.matches
            .try_get_one::<String>(id)
            .ok()
            .flatten()
            .map(String::as_str)
    }

    pub fn flag_bool(&self, id: &str) -> bool {
        self.matches
            .try_get_one::<bool>(id)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false)
    }
}

/// Outcome of running a node from an argument vector.
#[derive(Debug)]
pub enum Parsed {
    /// A node was resolved; `handler` is `None` for group nodes.
    Node {
        invocation: Invocation,
        handler: Option<Handler>,
        help: String,
    },
    /// clap produced help/version/usage output instead of matches.
    Clap(clap::Error),
}

#[derive(Debug, Clone)]
pub struct CommandTree {
    root: Command,
    handlers: HashMap<Vec<String>, Handler>,
}

impl CommandTree {
    pub fn new(root: Command) -> Self {
        Self {
            root,
            handlers: HashMap::new(),
        }
    }

    /// Attach a handler to the node at `path` (tokens below the root).
    pub fn handler<S: AsRef<str>>(mut self, path: &[S], handler: Handler) -> Self {
        let key = path.iter().map(|s| s.as_ref().to_string()).collect();
        self.handlers.insert(key, handler);
        self
    }

    /// Attach an extra top-level subcommand, e.g. the hidden `mcp` group.
    pub fn with_subcommand(mut self, cmd: Command) -> Self {
        self.root = self.root.subcommand(cmd);
        self
    }

    pub fn root(&self) -> &Command {
        &self.root
    }

    pub fn root_name(&self) -> &str {
        self.root.get_name()
    }

    pub fn handler_for(&self, path: &[String]) -> Option<&Handler> {
        self.handlers.get(path)
    }

    /// Find the clap node at `path`.
    pub fn node(&self, path: &[String]) -> Option<&Command> {
        let mut cur = &self.root;
        for token in path {
            cur = cur.find_subcommand(token)?;
        }
        Some(cur)
    }

    /// Parse `argv` (without the binary name) against a fresh copy of the tree.
    pub fn parse<I, S>(&self, argv: I) -> Parsed
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut full: Vec<String> = vec![self.root.get_name().to_string()];
        full.extend(argv.into_iter().map(Into::into));

        let matches = match self.root.clone().try_get_matches_from(&full) {
            Ok(m) => m,
            Err(e) => return Parsed::Clap(e),
        };

        let mut path = Vec::new();
        let mut leaf = matches;
        while let Some((name, sub)) = leaf.remove_subcommand() {
            path.push(name);
            leaf = sub;
        }

        let node = self.node(&path);
        let args = node.map(|n| positional_values(n, &leaf)).unwrap_or_default();
        let help = node
            .map(|n| render_help(n, self.root.get_name(), &path))
            .unwrap_or_default();
        let handler = self.handlers.get(&path).cloned();
        Parsed::Node {
            invocation: Invocation {
                path,
                matches: leaf,
                args,
            },
            handler,
            help,
        }
    }

    /// Parse and run `argv`, writing handler output to `out`.
    ///
    /// Returns the process exit code the host binary should use.
    pub fn run<I, S>(&self, argv: I, out: &mut dyn Write) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.parse(argv) {
            Parsed::Clap(e) => {
                let code = e.exit_code();
                let _ = e.print();
                code
            }
            Parsed::Node {
                invocation,
                handler: None,
                help,
            } => {
                tracing::debug!(path = ?invocation.path, "group node invoked; printing help");
                let _ = out.write_all(help.as_bytes());
                0
            }
            Parsed::Node {
                invocation,
                handler: Some(handler),
                ..
            } => match handler.call(&invocation, out) {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    1
                }
            },
        }
    }

    /// Run with the process arguments and exit with the resulting code.
    pub fn run_from_env(&self) -> ! {
        let argv: Vec<String> = std::env::args().skip(1).collect();
        let mut stdout = std::io::stdout();
        let code = self.run(argv, &mut stdout);
        let _ = stdout.flush();
        std::process::exit(code)
    }
}

/// Render the long help of `node` with its full command path as the binary name.
pub fn render_help(node: &Command, root_name: &str, path: &[String]) -> String {
    let mut cmd = node.clone().bin_name(bin_name(root_name, path));
    cmd.render_long_help().to_string()
}

/// Render the usage line of `node` without clap's `Usage: ` prefix.
pub fn render_usage(node: &Command, root_name: &str, path: &[String]) -> String {
    let mut cmd = node.clone().bin_name(bin_name(root_name, path));
    let usage = cmd.render_usage().to_string();
    usage
        .trim()
        .strip_prefix("Usage:")
        .map(str::trim)
        .unwrap_or(usage.trim())
        .to_string()
}

fn bin_name(root_name: &str, path: &[String]) -> String {
    std::iter::once(root_name.to_string())
        .chain(path.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Positional values of the resolved node, in declaration order.
fn positional_values(node: &Command, matches: &ArgMatches) -> Vec<String> {
    let mut out = Vec::new();
    for arg in node.get_positionals() {
        if let Ok(Some(raw)) = matches.try_get_raw(arg.get_id().as_str()) {
            out.extend(raw.map(|v| v.to_string_lossy().into_owned()));
        }
    }
    out
}
