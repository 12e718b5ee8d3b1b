//! Tool call dispatch: tool name + JSON arguments → a validated command line.
//!
//! Nothing is executed here. Every validation error is collected before a
//! `ResolvedCall` is produced, so a rejected call has no side effects.

use serde_json::Value;

use crate::catalog::{Catalog, JsonObject, ToolTarget};
use crate::discover::{CommandDescriptor, FlagDescriptor, FlagKind, FlagStyle};
use crate::error::{Error, FlagError, Result};

/// A fully validated command invocation.
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    pub descriptor: CommandDescriptor,
    /// Command path, serialized flags, then `--` and positional args.
    pub argv: Vec<String>,
    /// Validated flag values as supplied by the caller.
    pub flags: JsonObject,
    pub args: Vec<String>,
}

impl ResolvedCall {
    pub fn path(&self) -> &[String] {
        &self.descriptor.path
    }
}

#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Call to the help tool with its optional `command` query.
    Help(Option<String>),
    Command(ResolvedCall),
}

pub struct Dispatcher<'a> {
    catalog: &'a Catalog,
}

impl<'a> Dispatcher<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn dispatch(&self, tool: &str, arguments: &JsonObject) -> Result<Dispatch> {
        let prefix = format!("{}_", self.catalog.prefix());
        if !tool.starts_with(&prefix) {
            return Err(Error::UnknownTool(tool.to_string()));
        }
        let def = self
            .catalog
            .get(tool)
            .ok_or_else(|| Error::UnknownTool(tool.to_string()))?;
        tracing::debug!(tool, "tool name resolved");

        let allowed: &[&str] = match def.target {
            ToolTarget::Hierarchical { .. } => &["resource", "flags", "args"],
            ToolTarget::Standalone { .. } => &["flags", "args"],
            ToolTarget::Help => &["command"],
        };
        if let Some(extra) = arguments.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(Error::InvalidArguments(format!(
                "unexpected argument '{extra}' (expected {})",
                allowed.join(", ")
            )));
        }
        let flags = flags_object(arguments)?;
        let args = positional_args(arguments)?;

        let (base, min_len) = match &def.target {
            ToolTarget::Hierarchical { action, resources } => {
                let resource = match arguments.get("resource") {
                    Some(Value::String(r)) if resources.contains(r) => r.clone(),
                    other => {
                        return Err(Error::UnknownResource {
                            tool: tool.to_string(),
                            resource: other.and_then(|v| match v {
                                Value::Null => None,
                                Value::String(s) => Some(s.clone()),
                                v => Some(v.to_string()),
                            }),
                            expected: resources.clone(),
                        });
                    }
                };
                tracing::debug!(tool, resource = %resource, "resource validated");
                (vec![action.clone(), resource], 2)
            }
            ToolTarget::Standalone { path } => (path.clone(), path.len()),
            ToolTarget::Help => return help_query(arguments).map(Dispatch::Help),
        };

        let mut tokens = base;
        tokens.extend(args.iter().cloned());
        let (descriptor, rest) = self
            .catalog
            .registry()
            .resolve(&tokens, min_len)
            .ok_or_else(|| Error::CommandNotFound(tokens[..min_len].to_vec()))?;

        let flag_tokens = validate_flags(descriptor, &flags)?;
        tracing::debug!(path = %descriptor.display_path(), "flags validated");

        let mut argv = descriptor.path.clone();
        argv.extend(flag_tokens);
        if !rest.is_empty() {
            argv.push("--".to_string());
            argv.extend(rest.iter().cloned());
        }

        Ok(Dispatch::Command(ResolvedCall {
            descriptor: descriptor.clone(),
            argv,
            flags,
            args: rest.to_vec(),
        }))
    }
}

fn help_query(arguments: &JsonObject) -> Result<Option<String>> {
    match arguments.get("command") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::InvalidArguments(format!(
            "'command' must be a string, got {other}"
        ))),
    }
}

fn flags_object(arguments: &JsonObject) -> Result<JsonObject> {
    match arguments.get("flags") {
        None | Some(Value::Null) => Ok(JsonObject::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(Error::InvalidArguments(format!(
            "'flags' must be an object, got {other}"
        ))),
    }
}

/// `args` as an array of scalars, or a single string split shell-style.
fn positional_args(arguments: &JsonObject) -> Result<Vec<String>> {
    match arguments.get("args") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                scalar_text(v).ok_or_else(|| {
                    Error::InvalidArguments(format!("'args' entries must be scalars, got {v}"))
                })
            })
            .collect(),
        Some(Value::String(s)) => shell_words::split(s)
            .map_err(|e| Error::InvalidArguments(format!("cannot split 'args': {e}"))),
        Some(other) => Err(Error::InvalidArguments(format!(
            "'args' must be an array of strings, got {other}"
        ))),
    }
}

/// Check every supplied flag and every required flag, then serialize.
///
/// Errors are sorted by flag name so the report does not depend on the
/// caller's key order.
fn validate_flags(desc: &CommandDescriptor, flags: &JsonObject) -> Result<Vec<String>> {
    let mut errors = Vec::new();

    for (name, value) in flags {
        match desc.flag(name) {
            None => errors.push(FlagError::Unknown(name.clone())),
            Some(flag) => {
                if let Err(reason) = flag_tokens(flag, value) {
                    errors.push(FlagError::InvalidValue {
                        flag: name.clone(),
                        reason,
                    });
                }
            }
        }
    }
    for flag in desc.required_flags() {
        if !flags.contains_key(&flag.name) {
            errors.push(FlagError::MissingRequired(flag.name.clone()));
        }
    }

    if !errors.is_empty() {
        errors.sort_by(|a, b| a.flag().cmp(b.flag()));
        return Err(Error::InvalidFlags(errors));
    }

    // Declaration order keeps argv stable across calls.
    let mut out = Vec::new();
    for flag in &desc.flags {
        if let Some(value) = flags.get(&flag.name) {
            out.extend(flag_tokens(flag, value).unwrap_or_default());
        }
    }
    Ok(out)
}

/// Command-line tokens for one flag value.
fn flag_tokens(flag: &FlagDescriptor, value: &Value) -> std::result::Result<Vec<String>, String> {
    match flag.style {
        FlagStyle::Switch => Ok(if parse_bool(value)? {
            vec![flag.switch()]
        } else {
            Vec::new()
        }),
        FlagStyle::Counter => {
            let n = match value {
                Value::Bool(b) => u64::from(*b),
                Value::Number(n) => n
                    .as_u64()
                    .ok_or_else(|| format!("expected a non-negative integer, got {n}"))?,
                Value::String(s) => s
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| format!("expected a non-negative integer, got '{s}'"))?,
                other => return Err(format!("expected a count, got {}", type_name(other))),
            };
            Ok((0..n).map(|_| flag.switch()).collect())
        }
        FlagStyle::Repeated => {
            let mut out = Vec::new();
            for text in list_items(value)? {
                out.extend(value_tokens(flag, &text));
            }
            Ok(out)
        }
        // One occurrence; positionals only ever follow `--`.
        FlagStyle::MultiValue => {
            let items = list_items(value)?;
            if items.is_empty() {
                return Ok(Vec::new());
            }
            let mut out = vec![flag.switch()];
            out.extend(items);
            Ok(out)
        }
        FlagStyle::Value => {
            let text = match value {
                Value::Array(_) => return Err("expected a single value, got array".to_string()),
                v => scalar_text(v)
                    .ok_or_else(|| format!("expected a scalar, got {}", type_name(v)))?,
            };
            check_kind(flag.kind, &text)?;
            Ok(value_tokens(flag, &text))
        }
    }
}

fn list_items(value: &Value) -> std::result::Result<Vec<String>, String> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        scalar => vec![scalar],
    };
    items
        .into_iter()
        .map(|item| {
            scalar_text(item)
                .ok_or_else(|| format!("list items must be scalars, got {}", type_name(item)))
        })
        .collect()
}

fn value_tokens(flag: &FlagDescriptor, text: &str) -> Vec<String> {
    match &flag.long {
        Some(_) => vec![format!("{}={text}", flag.switch())],
        None => vec![flag.switch(), text.to_string()],
    }
}

fn check_kind(kind: FlagKind, text: &str) -> std::result::Result<(), String> {
    let ok = match kind {
        FlagKind::Integer => text.trim().parse::<i64>().is_ok(),
        FlagKind::Float => text.trim().parse::<f64>().is_ok(),
        FlagKind::Bool => parse_bool(&Value::String(text.to_string())).is_ok(),
        FlagKind::String | FlagKind::StringList => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("expected {}, got '{text}'", kind.json_type()))
    }
}

fn parse_bool(value: &Value) -> std::result::Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(true),
            "false" | "0" | "no" | "n" | "" => Ok(false),
            _ => Err(format!("expected boolean, got '{s}'")),
        },
        other => Err(format!("expected boolean, got {}", type_name(other))),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
