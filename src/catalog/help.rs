//! Text produced by the `{prefix}_help` tool.

use std::fmt::Write as _;

use crate::catalog::Catalog;
use crate::discover::{CommandDescriptor, FlagDescriptor};

/// Find the command best matching `query`.
///
/// Order: exact path (space or underscore separated), then a path ending in
/// the last token, then the first path containing the query text.
pub fn closest_match<'a>(catalog: &'a Catalog, query: &str) -> Option<&'a CommandDescriptor> {
    let registry = catalog.registry();
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let query = query
        .strip_prefix(&format!("{}_", catalog.prefix()))
        .unwrap_or(query);

    let mut tokens = shell_words::split(query)
        .unwrap_or_else(|_| query.split_whitespace().map(str::to_string).collect());
    if tokens.len() == 1 && registry.find(&tokens).is_none() && tokens[0].contains('_') {
        tokens = tokens[0].split('_').map(str::to_string).collect();
    }
    if let Some(desc) = registry.find(&tokens) {
        return Some(desc);
    }

    let last = tokens.last()?;
    if let Some(desc) = registry.iter().find(|d| d.name() == last) {
        return Some(desc);
    }

    let needle = query.to_ascii_lowercase();
    registry
        .iter()
        .find(|d| d.display_path().to_ascii_lowercase().contains(&needle))
}

/// Help text for `query`, or the full listing when there is no match.
pub fn render(catalog: &Catalog, query: Option<&str>) -> String {
    match query.and_then(|q| closest_match(catalog, q)) {
        Some(desc) => describe(catalog, desc),
        None => {
            let mut out = String::new();
            if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
                let _ = writeln!(out, "No command matches '{q}'.\n");
            }
            out.push_str(&listing(catalog));
            out
        }
    }
}

fn describe(catalog: &Catalog, desc: &CommandDescriptor) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Command: {} {}", catalog.root_name(), desc.display_path());
    if !desc.long.is_empty() {
        let _ = writeln!(out, "{}", desc.long);
    } else if !desc.short.is_empty() {
        let _ = writeln!(out, "{}", desc.short);
    }
    let _ = writeln!(out, "Usage: {}", desc.usage);
    if let Some(tool) = catalog.tool_for_path(&desc.path) {
        let _ = writeln!(out, "Tool: {tool}");
    }
    if catalog.is_dangerous(&desc.path) {
        let _ = writeln!(out, "DANGEROUS: confirm with the user before running this command.");
    }

    if !desc.flags.is_empty() {
        let _ = writeln!(out, "\nFlags:");
        for flag in &desc.flags {
            let _ = writeln!(out, "  {}", flag_line(flag));
        }
    }

    let children: Vec<&CommandDescriptor> = catalog
        .registry()
        .iter()
        .filter(|d| d.path.len() == desc.path.len() + 1 && d.path.starts_with(&desc.path))
        .collect();
    if !children.is_empty() {
        let _ = writeln!(out, "\nSubcommands:");
        for child in children {
            let _ = writeln!(out, "  {:<16} {}", child.name(), child.summary());
        }
    }
    out
}

fn flag_line(flag: &FlagDescriptor) -> String {
    let mut line = flag.switch();
    if let Some(c) = flag.shorthand.filter(|_| flag.long.is_some()) {
        let _ = write!(line, ", -{c}");
    }
    let _ = write!(line, " ({}", flag.kind.json_type());
    if flag.required {
        line.push_str(", required");
    }
    if flag.inherited {
        line.push_str(", global");
    }
    line.push(')');
    if !flag.description.is_empty() {
        let _ = write!(line, ": {}", flag.description);
    }
    if let Some(values) = &flag.enum_hint {
        let _ = write!(line, " [values: {}]", values.join(", "));
    }
    line
}

fn listing(catalog: &Catalog) -> String {
    let registry = catalog.registry();
    let classification = catalog.classification();
    let mut out = String::new();
    let _ = writeln!(out, "Available commands for {}:", catalog.root_name());

    if !classification.actions.is_empty() {
        let _ = writeln!(out, "\nActions:");
        for group in &classification.actions {
            let summary = registry
                .find(&[group.action.as_str()])
                .map(|d| d.summary())
                .unwrap_or_default();
            let _ = writeln!(out, "  {}: {summary}", catalog.tool_name(&group.action));
            let _ = writeln!(out, "    resources: {}", group.resources.join(", "));
        }
    }
    if !classification.standalone.is_empty() {
        let _ = writeln!(out, "\nStandalone:");
        for name in &classification.standalone {
            let summary = registry
                .find(&[name.as_str()])
                .map(|d| d.summary())
                .unwrap_or_default();
            let _ = writeln!(out, "  {}: {summary}", catalog.tool_name(name));
        }
    }
    let _ = writeln!(
        out,
        "\nCall {} with {{\"command\": \"<path>\"}} for details on one command.",
        catalog.help_tool_name()
    );
    out
}
