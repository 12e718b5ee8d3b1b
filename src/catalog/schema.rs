//! JSON input schemas for the generated tools.
//!
//! Hierarchical tool:
//! ```json
//! { "type": "object",
//!   "properties": {
//!     "resource": { "type": "string", "enum": [...] },
//!     "flags":    { "type": "object", "properties": { ... } },
//!     "args":     { "type": "array", "items": { "type": "string" } } },
//!   "required": ["resource"] }
//! ```
//! Standalone tools drop `resource` and list their required flags inside the
//! `flags` object.

use serde_json::{Map, Value, json};

use crate::catalog::classify::ActionGroup;
use crate::discover::{CommandDescriptor, FlagDescriptor, FlagKind, Registry};

pub type JsonObject = Map<String, Value>;

/// Schema fragment of a single flag.
pub fn flag_property(flag: &FlagDescriptor) -> Value {
    let mut prop = Map::new();
    prop.insert("type".into(), json!(flag.kind.json_type()));
    if !flag.description.is_empty() {
        prop.insert("description".into(), json!(flag.description));
    }
    match (flag.kind, &flag.enum_hint) {
        (FlagKind::StringList, hint) => {
            let mut items = Map::new();
            items.insert("type".into(), json!("string"));
            if let Some(values) = hint {
                items.insert("enum".into(), json!(values));
            }
            prop.insert("items".into(), Value::Object(items));
        }
        (FlagKind::String, Some(values)) => {
            prop.insert("enum".into(), json!(values));
        }
        _ => {}
    }
    Value::Object(prop)
}

fn args_property() -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "description": "Positional arguments passed after the command path",
    })
}

/// Input schema of an action tool covering every resource under it.
///
/// Flags are the union over all resources (first occurrence wins). None of
/// them is schema-required since requirements differ per resource; the
/// description says which resources require or accept a flag.
pub fn hierarchical_schema(group: &ActionGroup, registry: &Registry) -> JsonObject {
    let resources: Vec<&CommandDescriptor> = group
        .resources
        .iter()
        .filter_map(|r| registry.find(&[group.action.as_str(), r.as_str()]))
        .collect();

    let mut order: Vec<&FlagDescriptor> = Vec::new();
    for desc in &resources {
        for flag in &desc.flags {
            if !order.iter().any(|f| f.name == flag.name) {
                order.push(flag);
            }
        }
    }

    let mut flag_props = Map::new();
    for flag in order {
        let mut prop = flag_property(flag);
        let accepting: Vec<&str> = resources
            .iter()
            .filter(|d| d.flag(&flag.name).is_some())
            .map(|d| d.name())
            .collect();
        let requiring: Vec<&str> = resources
            .iter()
            .filter(|d| d.flag(&flag.name).is_some_and(|f| f.required))
            .map(|d| d.name())
            .collect();

        let mut notes = Vec::new();
        if accepting.len() < resources.len() {
            notes.push(format!("Only for: {}.", accepting.join(", ")));
        }
        if !requiring.is_empty() {
            notes.push(format!("Required for: {}.", requiring.join(", ")));
        }
        if !notes.is_empty()
            && let Value::Object(obj) = &mut prop
        {
            let base = obj
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let text = if base.is_empty() {
                notes.join(" ")
            } else {
                format!("{base} {}", notes.join(" "))
            };
            obj.insert("description".into(), json!(text));
        }
        flag_props.insert(flag.name.clone(), prop);
    }

    let mut properties = Map::new();
    properties.insert(
        "resource".into(),
        json!({
            "type": "string",
            "enum": group.resources,
            "description": format!("What to {}", group.action),
        }),
    );
    properties.insert(
        "flags".into(),
        json!({
            "type": "object",
            "properties": flag_props,
            "description": "Command flags by long name",
        }),
    );
    properties.insert("args".into(), args_property());

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    schema.insert("required".into(), json!(["resource"]));
    schema
}

/// Input schema of a standalone tool: flags map 1:1 onto the command's flags.
pub fn standalone_schema(desc: &CommandDescriptor) -> JsonObject {
    let flag_props: Map<String, Value> = desc
        .flags
        .iter()
        .map(|f| (f.name.clone(), flag_property(f)))
        .collect();
    let required: Vec<&str> = desc.required_flags().map(|f| f.name.as_str()).collect();

    let mut flags = Map::new();
    flags.insert("type".into(), json!("object"));
    flags.insert("properties".into(), Value::Object(flag_props));
    if !required.is_empty() {
        flags.insert("required".into(), json!(required));
    }
    flags.insert("description".into(), json!("Command flags by long name"));

    let mut properties = Map::new();
    properties.insert("flags".into(), Value::Object(flags));
    properties.insert("args".into(), args_property());

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(["flags"]));
    }
    schema
}

pub fn help_schema() -> JsonObject {
    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert(
        "properties".into(),
        json!({
            "command": {
                "type": "string",
                "description": "Command path or name to describe, e.g. \"create cluster\". Omit to list everything.",
            }
        }),
    );
    schema
}
