/*!
call.rs

`mcp call <TOOL>`: run one tool the way an MCP client would and print the
result.

  mcp call demo_list --param resource=nodes --param limit=1
  mcp call demo_create --param-file cluster.yaml --json
  mcp call demo_help --param command="create cluster"

`--param` values are coerced by the flag's declared kind; `resource`,
`args` and `command` are passed through at the top level. A failed tool
call exits non-zero.
*/

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, anyhow, bail};
use clap::Args;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::bridge::{ToolBridge, ToolResponse};
use crate::catalog::JsonObject;
use crate::cmd::format::{Role, StyleOptions, box_header, color, emoji, table};
use crate::cmd::shared::{build_call_arguments, load_param_file_into_map, parse_param};

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Tool name to invoke
    #[arg(value_name = "TOOL")]
    pub tool: String,

    /// Provide parameter (KEY=VALUE), repeatable
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Load parameters from file (JSON or YAML). CLI --param overrides file entries
    #[arg(long = "param-file", value_name = "PATH")]
    pub param_file: Option<PathBuf>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute_call(bridge: &ToolBridge, args: CallArgs) -> Result<()> {
    let arguments = match collect_arguments(bridge, &args) {
        Ok(a) => a,
        Err(e) => return output_error(args.json, &args.tool, &format!("{e:#}")),
    };

    let ct = CancellationToken::new();
    let cancel = ct.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let started = Instant::now();
    let resp = bridge
        .call_tool(&args.tool, Some(arguments.clone()), ct)
        .await;
    let elapsed_ms = started.elapsed().as_millis();

    if resp.is_error {
        return output_error(args.json, &args.tool, &resp.joined());
    }

    if args.json {
        let body = json!({
            "status": "ok",
            "tool": args.tool,
            "elapsed_ms": elapsed_ms,
            "arguments": arguments,
            "content": resp.content,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print_human(&args.tool, &arguments, &resp, elapsed_ms);
    }
    Ok(())
}

fn collect_arguments(bridge: &ToolBridge, args: &CallArgs) -> Result<JsonObject> {
    let def = bridge
        .catalog()
        .get(&args.tool)
        .ok_or_else(|| anyhow!("unknown tool: '{}'", args.tool))?;

    let mut provided: HashMap<String, Value> = HashMap::new();
    for raw in &args.params {
        let (k, v) = parse_param(raw)?;
        provided.insert(k, Value::String(v));
    }
    if let Some(path) = &args.param_file {
        load_param_file_into_map(path, &mut provided)?;
    }
    build_call_arguments(def, provided)
}

fn print_human(tool: &str, arguments: &JsonObject, resp: &ToolResponse, elapsed_ms: u128) {
    let style = StyleOptions::detect();
    let header = box_header(
        format!("{} Call Success ({tool})", emoji("success", &style)),
        Some(format!("{elapsed_ms} ms").as_str()),
        &style,
    );
    println!("{header}");

    let rows = argument_rows(arguments);
    if rows.is_empty() {
        println!(
            "{}",
            color(
                Role::Dim,
                format!("{} No arguments supplied", emoji("info", &style)),
                &style
            )
        );
    } else {
        println!("{}", color(Role::Accent, "Arguments:", &style));
        println!("{}", table(&["NAME", "VALUE"], &rows, &style));
    }

    println!();
    println!("{}", color(Role::Accent, "Output:", &style));
    println!("{}", resp.joined().trim_end());
}

/// One row per top-level argument, flags expanded as `flags.<name>`.
fn argument_rows(arguments: &JsonObject) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for (k, v) in arguments {
        match v {
            Value::Object(flags) if k == "flags" => {
                for (f, fv) in flags {
                    rows.push(vec![format!("flags.{f}"), value_text(fv)]);
                }
            }
            other => rows.push(vec![k.clone(), value_text(other)]),
        }
    }
    rows.sort_by(|a, b| a[0].cmp(&b[0]));
    rows
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn output_error(json: bool, tool: &str, msg: &str) -> Result<()> {
    if json {
        let err = json!({ "status": "error", "tool": tool, "error": msg });
        println!(
            "{}",
            serde_json::to_string_pretty(&err).unwrap_or_else(|_| err.to_string())
        );
    } else {
        let style = StyleOptions::detect();
        let title = format!("{} Call Failed ({tool})", emoji("error", &style));
        println!("{}", box_header(title, None, &style));
        println!("{}", color(Role::Error, msg, &style));
    }
    bail!("tool '{tool}' failed")
}
