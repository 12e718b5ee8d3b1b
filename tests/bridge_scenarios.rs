//! End-to-end tool calls through `ToolBridge`, with sub-process calls
//! re-invoking the bundled demo binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Arg, Command};

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use clap_mcp::catalog::JsonObject;
use clap_mcp::demo::{CLUSTERS_JSON, VERSION_LINE, demo_tree};
use clap_mcp::discover::{FlagDescriptor, FlagKind};
use clap_mcp::error::FlagError;
use clap_mcp::{CommandTree, Error, ExecutionMode, Handler, ServerConfig, ToolBridge};

fn demo_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_clap-mcp-demo"))
}

fn bridge(mode: ExecutionMode) -> ToolBridge {
    let config = ServerConfig {
        program: Some(demo_bin()),
        intercept_streams: false,
        ..ServerConfig::default().with_mode(mode)
    };
    ToolBridge::new(demo_tree(), config)
}

fn args(v: Value) -> JsonObject {
    v.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn list_clusters_in_subprocess() {
    let b = bridge(ExecutionMode::SubProcess);
    let res = b
        .execute("demo_list", &args(json!({ "resource": "clusters" })))
        .await
        .unwrap();
    assert_eq!(res.stdout, format!("{CLUSTERS_JSON}\n"));
    assert_eq!(res.exit_code, 0);
    assert!(res.error.is_none());
}

#[tokio::test]
async fn standalone_tool_takes_no_resource() {
    let b = bridge(ExecutionMode::SubProcess);
    let def = b.catalog().get("demo_version").unwrap();
    assert!(def.input_schema["properties"].get("resource").is_none());

    let res = b.execute("demo_version", &JsonObject::new()).await.unwrap();
    assert_eq!(res.stdout.trim(), VERSION_LINE);
}

#[tokio::test]
async fn missing_required_flags_never_run() {
    let b = bridge(ExecutionMode::SubProcess);
    let err = b
        .execute(
            "demo_create",
            &args(json!({ "resource": "cluster", "flags": { "name": "test" } })),
        )
        .await
        .unwrap_err();
    let missing: Vec<&str> = err
        .flag_errors()
        .iter()
        .map(|e| {
            assert!(matches!(e, FlagError::MissingRequired(_)));
            e.flag()
        })
        .collect();
    assert_eq!(missing, vec!["region", "size"]);
}

#[tokio::test]
async fn rejected_call_has_no_side_effects() {
    let ran = Arc::new(AtomicBool::new(false));
    let seen = ran.clone();
    let tree = CommandTree::new(
        Command::new("t").subcommand(
            Command::new("make").subcommand(
                Command::new("thing").arg(Arg::new("name").long("name").required(true)),
            ),
        ),
    )
    .handler(
        &["make", "thing"],
        Handler::fallible(move |_, _| {
            seen.store(true, Ordering::SeqCst);
            Ok(())
        }),
    );
    let config = ServerConfig {
        intercept_streams: false,
        ..ServerConfig::default().with_mode(ExecutionMode::InProcess)
    };
    let b = ToolBridge::new(tree, config);

    let err = b
        .execute("t_make", &args(json!({ "resource": "thing" })))
        .await
        .unwrap_err();
    assert_eq!(err.flag_errors(), &[FlagError::MissingRequired("name".into())]);
    assert!(!ran.load(Ordering::SeqCst));

    b.execute("t_make", &args(json!({ "resource": "thing", "flags": { "name": "x" } })))
        .await
        .unwrap();
    assert!(ran.load(Ordering::SeqCst));
}

fn sample_value(flag: &FlagDescriptor) -> Value {
    if let Some(first) = flag.enum_hint.as_ref().and_then(|v| v.first()) {
        return json!(first);
    }
    match flag.kind {
        FlagKind::Bool => json!(true),
        FlagKind::Integer => json!(1),
        FlagKind::Float => json!(1.5),
        FlagKind::StringList => json!(["x"]),
        FlagKind::String => json!("x"),
    }
}

#[tokio::test]
async fn every_runnable_command_accepts_its_required_flags() {
    let b = bridge(ExecutionMode::InProcess);
    let catalog = b.catalog();
    let classification = catalog.classification();
    let mut called = 0;

    for desc in catalog.registry().iter().filter(|d| d.runnable) {
        // crash and fail exist to exercise failure paths
        if desc.path == ["crash"] || desc.path == ["fail"] {
            continue;
        }
        let flags: serde_json::Map<String, Value> = desc
            .required_flags()
            .map(|f| (f.name.clone(), sample_value(f)))
            .collect();
        let (tool, call) = match classification.action(&desc.path[0]) {
            Some(group) if desc.path.len() >= 2 => (
                format!("demo_{}", group.action),
                json!({ "resource": desc.path[1], "flags": flags, "args": desc.path[2..] }),
            ),
            _ => {
                assert!(classification.is_standalone(&desc.path[0]), "{:?}", desc.path);
                (format!("demo_{}", desc.path[0]), json!({ "flags": flags }))
            }
        };

        let res = b
            .execute(&tool, &args(call))
            .await
            .unwrap_or_else(|e| panic!("{}: {e}", desc.display_path()));
        assert_eq!(res.exit_code, 0, "{}", desc.display_path());
        called += 1;
    }
    assert_eq!(called, 6);
}

#[tokio::test]
async fn terminating_handler_exit_is_captured() {
    let b = bridge(ExecutionMode::SubProcess);
    let err = b.execute("demo_crash", &JsonObject::new()).await.unwrap_err();
    match err {
        Error::CommandExecution { path, result } => {
            assert_eq!(path, vec!["crash"]);
            assert_eq!(result.exit_code, 2);
            assert!(result.stderr.contains("boom"));
            assert!(result.error.is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn auto_mode_isolates_terminating_handlers() {
    let b = bridge(ExecutionMode::Auto);
    let resp = b.call_tool("demo_crash", None, CancellationToken::new()).await;
    assert!(resp.is_error);
    assert!(resp.joined().contains("Exit code: 2"));

    // still alive; fallible handlers run in-process
    let resp = b
        .call_tool("demo_version", None, CancellationToken::new())
        .await;
    assert!(!resp.is_error);
    assert_eq!(resp.joined().trim(), VERSION_LINE);
}

#[tokio::test]
async fn subprocess_and_in_process_agree() {
    let call = args(json!({ "resource": "nodes", "flags": { "limit": 2 }, "args": ["node"] }));
    let sub = bridge(ExecutionMode::SubProcess)
        .execute("demo_list", &call)
        .await
        .unwrap();
    let inproc = bridge(ExecutionMode::InProcess)
        .execute("demo_list", &call)
        .await
        .unwrap();
    assert_eq!(sub.stdout, "node-a\nnode-b\n");
    assert_eq!(sub.stdout, inproc.stdout);
}

#[tokio::test]
async fn handler_error_reports_stderr() {
    let b = bridge(ExecutionMode::SubProcess);
    let resp = b
        .call_tool(
            "demo_create",
            Some(args(json!({
                "resource": "cluster",
                "flags": { "name": "c", "region": "eu", "size": "Huge" }
            }))),
            CancellationToken::new(),
        )
        .await;
    assert!(resp.is_error);
    let text = resp.joined();
    assert!(text.contains("Exit code: 1"), "{text}");
    assert!(text.contains("size must be one of"), "{text}");
}

#[tokio::test]
async fn cancelled_call_does_not_start() {
    let b = bridge(ExecutionMode::SubProcess);
    let ct = CancellationToken::new();
    ct.cancel();
    let err = b
        .execute_with("demo_list", &args(json!({ "resource": "clusters" })), ct)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "Cancelled");
}

#[tokio::test]
async fn whitelist_limits_tools() {
    let config = ServerConfig {
        program: Some(demo_bin()),
        actions: Some(vec!["list".into()]),
        standalone: Some(vec!["version".into()]),
        ..ServerConfig::default()
    };
    let b = ToolBridge::new(demo_tree(), config);
    let names: Vec<&str> = b.list_tools().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["demo_list", "demo_version", "demo_help"]);

    let resp = b
        .call_tool("demo_create", None, CancellationToken::new())
        .await;
    assert!(resp.is_error);
    assert_eq!(resp.joined(), "unknown tool: 'demo_create'");
}

#[tokio::test]
async fn help_tool_describes_commands() {
    let b = bridge(ExecutionMode::SubProcess);
    let resp = b
        .call_tool(
            "demo_help",
            Some(args(json!({ "command": "create cluster" }))),
            CancellationToken::new(),
        )
        .await;
    assert!(!resp.is_error);
    let text = resp.joined();
    assert!(text.contains("Command: demo create cluster"));
    assert!(text.contains("Tool: demo_create (resource: cluster)"));
    assert!(text.contains("--size"));
}

#[test]
fn tool_listing_is_deterministic() {
    let dump = |b: &ToolBridge| serde_json::to_string(b.list_tools()).unwrap();
    let a = bridge(ExecutionMode::SubProcess);
    let b = bridge(ExecutionMode::SubProcess);
    assert_eq!(dump(&a), dump(&b));
    assert_eq!(dump(&a), dump(&a));
}
