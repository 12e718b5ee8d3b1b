/*!
tools.rs

`mcp tools [--json]`: print the tool catalog the server would advertise.

Human output is a boxed header plus a table:
  #  NAME  PARAMS  DESCRIPTION
JSON output mirrors what `tools/list` returns, wrapped in a status object.
*/

use anyhow::Result;
use clap::Args;
use serde_json::{Value, json};

use crate::bridge::ToolBridge;
use crate::catalog::ToolDefinition;
use crate::cmd::format::{Role, StyleOptions, box_header, color, emoji, table, truncate_ellipsis};

#[derive(Args, Debug, Default)]
pub struct ToolsArgs {
    /// Output JSON instead of human-readable text
    #[arg(long)]
    pub json: bool,
}

pub fn execute_tools(bridge: &ToolBridge, args: ToolsArgs) -> Result<()> {
    let tools = bridge.list_tools();
    let config = bridge.config();

    if args.json {
        let body = json!({
            "status": "ok",
            "server": config.name,
            "mode": config.execution_mode.as_str(),
            "count": tools.len(),
            "tools": tools,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let style = StyleOptions::detect();
    println!("{}", render_table(bridge, &style));
    println!(
        "\n{} {}",
        emoji("info", &style),
        color(
            Role::Dim,
            format!(
                "Use `mcp call {} --param command=\"<path>\"` for details on one command",
                bridge.catalog().help_tool_name()
            ),
            &style
        )
    );
    Ok(())
}

fn render_table(bridge: &ToolBridge, style: &StyleOptions) -> String {
    let tools = bridge.list_tools();
    let catalog = bridge.catalog();
    let header = box_header(
        format!("{} Tools ({})", emoji("list", style), tools.len()),
        Some(
            format!(
                "prefix={} • mode={}",
                catalog.prefix(),
                bridge.config().execution_mode
            )
            .as_str(),
        ),
        style,
    );

    let rows: Vec<Vec<String>> = tools
        .iter()
        .enumerate()
        .map(|(idx, t)| {
            vec![
                (idx + 1).to_string(),
                t.name.clone(),
                param_summary(t),
                truncate_ellipsis(&t.description.replace('\n', " "), 90),
            ]
        })
        .collect();
    let tbl = table(&["#", "NAME", "PARAMS", "DESCRIPTION"], &rows, style);
    format!("{header}\n{tbl}")
}

/// `resource:string, flags:object` style summary of the top-level properties.
fn param_summary(def: &ToolDefinition) -> String {
    let Some(props) = def.input_schema.get("properties").and_then(Value::as_object) else {
        return "-".to_string();
    };
    if props.is_empty() {
        return "-".to_string();
    }
    let required: Vec<&str> = def
        .input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    props
        .iter()
        .map(|(name, p)| {
            let ty = p.get("type").and_then(Value::as_str).unwrap_or("any");
            let mark = if required.contains(&name.as_str()) { "*" } else { "" };
            format!("{name}{mark}:{ty}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}
