//! Command discovery: walk the host tree once and record every visible node.
//!
//! Traversal is depth-first preorder in registration order, so two runs over
//! the same tree produce the same registry. The root itself is not recorded;
//! its children start with an empty path prefix.

pub mod flags;

use std::collections::HashMap;

use clap::Command;
use serde::Serialize;

pub use flags::{FlagDescriptor, FlagKind, FlagStyle, enum_hint_from_description};

use crate::tree::{Capability, CommandTree, render_usage};

#[derive(Debug, Clone, Serialize)]
pub struct CommandDescriptor {
    pub path: Vec<String>,
    pub short: String,
    pub long: String,
    pub usage: String,
    /// Local flags first, then inherited globals.
    pub flags: Vec<FlagDescriptor>,
    #[serde(serialize_with = "serialize_capability")]
    pub capability: Capability,
    /// Has a handler attached. Group nodes without one only print help.
    pub runnable: bool,
}

impl CommandDescriptor {
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    pub fn display_path(&self) -> String {
        self.path.join(" ")
    }

    pub fn flag(&self, name: &str) -> Option<&FlagDescriptor> {
        self.flags.iter().find(|f| f.name == name)
    }

    pub fn required_flags(&self) -> impl Iterator<Item = &FlagDescriptor> {
        self.flags.iter().filter(|f| f.required)
    }

    /// Description preferring the short form.
    pub fn summary(&self) -> &str {
        if self.short.is_empty() {
            &self.long
        } else {
            &self.short
        }
    }
}

fn serialize_capability<S: serde::Serializer>(cap: &Capability, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(match cap {
        Capability::ReportsError => "reports-error",
        Capability::TerminatesOnly => "terminates-only",
    })
}

/// Ordered, read-only set of command descriptors.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    commands: Vec<CommandDescriptor>,
    index: HashMap<Vec<String>, usize>,
}

impl Registry {
    /// Discover every visible command below the root of `tree`.
    pub fn discover(tree: &CommandTree) -> Self {
        let mut registry = Registry::default();
        let root = tree.root();
        let inherited: Vec<FlagDescriptor> = global_flags(root);
        for child in root.get_subcommands() {
            walk(tree, child, &[], &inherited, &mut registry);
        }
        tracing::debug!(commands = registry.len(), "command discovery complete");
        registry
    }

    fn push(&mut self, desc: CommandDescriptor) {
        if self.index.contains_key(&desc.path) {
            tracing::warn!(path = %desc.display_path(), "duplicate command path ignored");
            return;
        }
        self.index.insert(desc.path.clone(), self.commands.len());
        self.commands.push(desc);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.iter()
    }

    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<&CommandDescriptor> {
        let key: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        self.index.get(&key).map(|&i| &self.commands[i])
    }

    /// Longest registered prefix of `tokens` that is at least `min_len` long.
    ///
    /// Returns the descriptor and the tokens left over as positional args.
    pub fn resolve<'a>(
        &self,
        tokens: &'a [String],
        min_len: usize,
    ) -> Option<(&CommandDescriptor, &'a [String])> {
        (min_len.max(1)..=tokens.len())
            .rev()
            .find_map(|n| self.find(&tokens[..n]).map(|d| (d, &tokens[n..])))
    }

    /// Visible runnable commands whose handler can only end the process.
    ///
    /// A top-level `help` command is ignored.
    pub fn terminating_commands(&self) -> Vec<&CommandDescriptor> {
        self.commands
            .iter()
            .filter(|d| d.runnable && d.capability == Capability::TerminatesOnly)
            .filter(|d| d.path != ["help"])
            .collect()
    }
}

fn walk(
    tree: &CommandTree,
    node: &Command,
    prefix: &[String],
    inherited: &[FlagDescriptor],
    registry: &mut Registry,
) {
    if node.is_hide_set() {
        return;
    }

    let mut path = prefix.to_vec();
    path.push(node.get_name().to_string());

    let mut flags: Vec<FlagDescriptor> = node
        .get_arguments()
        .filter_map(|a| FlagDescriptor::from_arg(a, false))
        .collect();
    for f in inherited {
        if !flags.iter().any(|l| l.name == f.name) {
            flags.push(f.clone());
        }
    }

    let handler = tree.handler_for(&path);
    let desc = CommandDescriptor {
        short: node.get_about().map(|s| s.to_string()).unwrap_or_default(),
        long: node
            .get_long_about()
            .map(|s| s.to_string())
            .unwrap_or_default(),
        usage: render_usage(node, tree.root_name(), &path),
        flags,
        capability: handler
            .map(|h| h.capability())
            .unwrap_or(Capability::ReportsError),
        runnable: handler.is_some(),
        path: path.clone(),
    };
    registry.push(desc);

    let mut child_inherited = inherited.to_vec();
    for g in global_flags(node) {
        if !child_inherited.iter().any(|f| f.name == g.name) {
            child_inherited.push(g);
        }
    }
    for child in node.get_subcommands() {
        walk(tree, child, &path, &child_inherited, registry);
    }
}

fn global_flags(node: &Command) -> Vec<FlagDescriptor> {
    node.get_arguments()
        .filter(|a| a.is_global_set())
        .filter_map(|a| FlagDescriptor::from_arg(a, true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_tree as sample_tree;

    fn paths(reg: &Registry) -> Vec<String> {
        reg.iter().map(|d| d.display_path()).collect()
    }

    #[test]
    fn preorder_in_registration_order() {
        let reg = Registry::discover(&sample_tree());
        assert_eq!(
            paths(&reg),
            vec![
                "create",
                "create cluster",
                "delete",
                "delete cluster",
                "list",
                "list clusters",
                "list nodes",
                "version",
                "crash",
                "fail",
                "noisy",
            ]
        );
    }

    #[test]
    fn discovery_is_stable() {
        let a = paths(&Registry::discover(&sample_tree()));
        let b = paths(&Registry::discover(&sample_tree()));
        assert_eq!(a, b);
    }

    #[test]
    fn hidden_subtree_is_skipped() {
        let reg = Registry::discover(&sample_tree());
        assert!(reg.find(&["internal"]).is_none());
        assert!(reg.find(&["internal", "debug"]).is_none());
    }

    #[test]
    fn inherited_global_flags_reach_descendants() {
        let reg = Registry::discover(&sample_tree());
        let cluster = reg.find(&["create", "cluster"]).unwrap();
        let output = cluster.flag("output").expect("global flag inherited");
        assert!(output.inherited);
        assert!(!cluster.flag("name").unwrap().inherited);
        assert_eq!(
            cluster.required_flags().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["name", "region", "size"]
        );
        assert_eq!(
            cluster.flag("size").unwrap().enum_hint,
            Some(vec!["Small".into(), "Medium".into(), "Large".into()])
        );
    }

    #[test]
    fn capability_and_runnable_come_from_handlers() {
        let reg = Registry::discover(&sample_tree());
        assert!(!reg.find(&["create"]).unwrap().runnable);
        let crash = reg.find(&["crash"]).unwrap();
        assert_eq!(crash.capability, Capability::TerminatesOnly);
        assert_eq!(
            reg.find(&["version"]).unwrap().capability,
            Capability::ReportsError
        );
        let terminating: Vec<_> = reg
            .terminating_commands()
            .iter()
            .map(|d| d.display_path())
            .collect();
        assert_eq!(terminating, vec!["crash"]);
    }

    #[test]
    fn usage_contains_full_path() {
        let reg = Registry::discover(&sample_tree());
        let usage = &reg.find(&["create", "cluster"]).unwrap().usage;
        assert!(usage.starts_with("demo create cluster"), "usage: {usage}");
    }

    #[test]
    fn resolve_uses_longest_prefix() {
        let reg = Registry::discover(&sample_tree());
        let tokens: Vec<String> = ["list", "nodes", "extra"].iter().map(|s| s.to_string()).collect();
        let (desc, rest) = reg.resolve(&tokens, 2).unwrap();
        assert_eq!(desc.display_path(), "list nodes");
        assert_eq!(rest, &["extra".to_string()]);
        assert!(reg.resolve(&tokens[..1], 2).is_none());
    }
}
