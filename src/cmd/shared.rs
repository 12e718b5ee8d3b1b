/*!
shared.rs

Helpers used by the `mcp call` subcommand to turn `--param KEY=VALUE` pairs
and an optional parameter file into the argument object a tool expects.

  parse_param("name=c1")            -> ("name", "c1")
  load_param_file_into_map(path, m) -> merges JSON / YAML; CLI wins
  coerce_value("5", "integer")      -> 5
  build_call_arguments(def, params) -> { resource, flags: {...}, args }
*/

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;

use crate::catalog::{JsonObject, ToolDefinition, ToolTarget};

/// Keys a tool call carries outside the `flags` object.
const RESOURCE_KEY: &str = "resource";
const ARGS_KEY: &str = "args";
const COMMAND_KEY: &str = "command";

/// Split `KEY=VALUE`. The value may itself contain `=`.
pub fn parse_param(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid --param '{raw}' (expected KEY=VALUE)"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("invalid --param '{raw}' (empty key)");
    }
    Ok((key.to_string(), value.to_string()))
}

/// Merge a JSON or YAML object into `provided`. Keys already present
/// (from `--param`) are kept.
pub fn load_param_file_into_map(path: &Path, provided: &mut HashMap<String, Value>) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read param file: {}", path.display()))?;
    let lower = path.to_string_lossy().to_ascii_lowercase();

    let value: Value = if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        let yaml_v: serde_yaml::Value =
            serde_yaml::from_str(&raw).context("failed to parse YAML param file")?;
        serde_json::to_value(yaml_v).context("failed to convert YAML to JSON")?
    } else {
        serde_json::from_str(&raw).context("failed to parse JSON param file")?
    };

    let Value::Object(obj) = value else {
        bail!("param file root must be an object");
    };
    for (k, v) in obj {
        provided.entry(k).or_insert(v);
    }
    Ok(())
}

/// Coerce a raw string into a JSON value using a JSON-schema type hint.
/// Values that do not parse stay strings so the dispatcher can report them.
pub fn coerce_value(raw: &str, type_hint: &str) -> Value {
    match type_hint {
        "integer" => raw
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        "number" => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        "boolean" => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Value::Bool(true),
            "false" | "0" | "no" | "n" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        "array" => Value::Array(
            raw.split(',')
                .map(|s| Value::String(s.trim().to_string()))
                .collect(),
        ),
        _ => Value::String(raw.to_string()),
    }
}

/// Build the argument object for `def` from loosely typed parameters.
///
/// `resource` and `args` go to the top level, everything else lands in
/// `flags`, coerced by the flag's schema type. Unknown flags pass through
/// as given and are rejected later by the dispatcher.
pub fn build_call_arguments(
    def: &ToolDefinition,
    provided: HashMap<String, Value>,
) -> Result<JsonObject> {
    let mut out = JsonObject::new();

    if def.target == ToolTarget::Help {
        for (k, v) in provided {
            if k != COMMAND_KEY {
                bail!("{} only accepts '{COMMAND_KEY}', got '{k}'", def.name);
            }
            out.insert(k, v);
        }
        return Ok(out);
    }

    let flag_props = def
        .input_schema
        .get("properties")
        .and_then(|p| p.get("flags"))
        .and_then(|f| f.get("properties"))
        .and_then(Value::as_object);

    let mut flags = JsonObject::new();
    let mut keys: Vec<String> = provided.keys().cloned().collect();
    keys.sort();
    let mut provided = provided;
    for key in keys {
        let Some(value) = provided.remove(&key) else {
            continue;
        };
        match key.as_str() {
            RESOURCE_KEY | ARGS_KEY => {
                out.insert(key, value);
            }
            _ => {
                let hint = flag_props
                    .and_then(|p| p.get(&key))
                    .and_then(|p| p.get("type"))
                    .and_then(Value::as_str)
                    .unwrap_or("string");
                let value = match value {
                    Value::String(raw) => coerce_value(&raw, hint),
                    other => other,
                };
                flags.insert(key, value);
            }
        }
    }
    if !flags.is_empty() {
        out.insert("flags".to_string(), Value::Object(flags));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::ServerConfig;
    use crate::demo::demo_tree;
    use serde_json::json;
    use std::io::Write;

    fn catalog() -> Catalog {
        Catalog::build(&demo_tree(), &ServerConfig::default())
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn parse_param_keeps_equals_in_value() {
        assert_eq!(
            parse_param("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn coerce_integer() {
        assert_eq!(coerce_value("5", "integer"), json!(5));
        assert_eq!(coerce_value("five", "integer"), json!("five"));
    }

    #[test]
    fn coerce_boolean() {
        assert_eq!(coerce_value("yes", "boolean"), json!(true));
        assert_eq!(coerce_value("No", "boolean"), json!(false));
    }

    #[test]
    fn coerce_array() {
        assert_eq!(coerce_value("a, b", "array"), json!(["a", "b"]));
    }

    #[test]
    fn param_file_json_merge() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "limit": 2, "name": "x" }}"#).unwrap();
        let mut provided = params(&[("name", "override")]);
        load_param_file_into_map(file.path(), &mut provided).unwrap();
        assert_eq!(provided["limit"], json!(2));
        assert_eq!(provided["name"], json!("override"));
    }

    #[test]
    fn param_file_yaml_lists_survive() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "tag: [a, b]").unwrap();
        let mut provided = HashMap::new();
        load_param_file_into_map(file.path(), &mut provided).unwrap();
        assert_eq!(provided["tag"], json!(["a", "b"]));
    }

    #[test]
    fn param_file_must_be_object() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "[1, 2]").unwrap();
        let err = load_param_file_into_map(file.path(), &mut HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }

    #[test]
    fn build_arguments_splits_flags_from_resource() {
        let cat = catalog();
        let def = cat.get("demo_list").unwrap();
        let args = build_call_arguments(
            def,
            params(&[("resource", "nodes"), ("limit", "2"), ("args", "a b")]),
        )
        .unwrap();
        assert_eq!(
            Value::Object(args),
            json!({ "resource": "nodes", "args": "a b", "flags": { "limit": 2 } })
        );
    }

    #[test]
    fn build_arguments_for_help_tool() {
        let cat = catalog();
        let def = cat.get("demo_help").unwrap();
        let args = build_call_arguments(def, params(&[("command", "create cluster")])).unwrap();
        assert_eq!(args["command"], json!("create cluster"));
        assert!(build_call_arguments(def, params(&[("name", "x")])).is_err());
    }
}
