//! Protocol-neutral facade over catalog, dispatcher and executor.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::catalog::{Catalog, JsonObject, ToolDefinition};
use crate::config::{ExecutionMode, ServerConfig};
use crate::dispatch::{Dispatch, Dispatcher};
use crate::error::{Error, Result};
use crate::exec::{ExecuteResult, Executor};
use crate::tree::CommandTree;

/// Result of a tool call as handed to the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResponse {
    pub is_error: bool,
    pub content: Vec<String>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![text.into()],
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![text.into()],
        }
    }

    pub fn joined(&self) -> String {
        self.content.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct ToolBridge {
    tree: Arc<CommandTree>,
    config: ServerConfig,
    catalog: Arc<Catalog>,
    executor: Executor,
}

impl ToolBridge {
    pub fn new(tree: CommandTree, config: ServerConfig) -> Self {
        let tree = Arc::new(tree);
        let catalog = Arc::new(Catalog::build(&tree, &config));
        let executor = Executor::new(tree.clone(), &config);
        warn_terminating(&catalog, config.execution_mode);
        Self {
            tree,
            config,
            catalog,
            executor,
        }
    }

    /// Replace the configuration and regenerate the tool catalog.
    pub fn reconfigure(&mut self, config: ServerConfig) {
        self.catalog = Arc::new(Catalog::build(&self.tree, &config));
        self.executor = Executor::new(self.tree.clone(), &config);
        warn_terminating(&self.catalog, config.execution_mode);
        self.config = config;
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Cached tool definitions; identical across calls until `reconfigure`.
    pub fn list_tools(&self) -> &[ToolDefinition] {
        self.catalog.tools()
    }

    /// Dispatch and run a tool call, rendering every outcome as a response.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
        ct: CancellationToken,
    ) -> ToolResponse {
        let arguments = arguments.unwrap_or_default();
        tracing::debug!(tool = name, "tool call received");
        match self.dispatch_and_run(name, &arguments, ct).await {
            Ok(Ran::Help(text)) => ToolResponse::text(text),
            Ok(Ran::Command { result, .. }) if result.is_success() => {
                if result.stdout.trim().is_empty() {
                    ToolResponse::text("(no output)")
                } else {
                    ToolResponse::text(result.stdout)
                }
            }
            Ok(Ran::Command { result, .. }) => {
                tracing::info!(tool = name, exit_code = result.exit_code, "tool call failed");
                ToolResponse::error(failure_text(&result))
            }
            Err(e) => {
                tracing::info!(tool = name, kind = e.kind(), "tool call rejected: {e}");
                ToolResponse::error(e.to_string())
            }
        }
    }

    /// Typed variant of `call_tool`. A non-zero exit becomes
    /// `Error::CommandExecution` carrying the captured output.
    pub async fn execute(&self, name: &str, arguments: &JsonObject) -> Result<ExecuteResult> {
        self.execute_with(name, arguments, CancellationToken::new())
            .await
    }

    pub async fn execute_with(
        &self,
        name: &str,
        arguments: &JsonObject,
        ct: CancellationToken,
    ) -> Result<ExecuteResult> {
        match self.dispatch_and_run(name, arguments, ct).await? {
            Ran::Help(text) => Ok(ExecuteResult {
                stdout: text,
                ..Default::default()
            }),
            Ran::Command { result, .. } if result.is_success() => Ok(result),
            Ran::Command { path, result } => Err(Error::CommandExecution {
                path,
                result: Box::new(result),
            }),
        }
    }

    async fn dispatch_and_run(
        &self,
        name: &str,
        arguments: &JsonObject,
        ct: CancellationToken,
    ) -> Result<Ran> {
        match Dispatcher::new(&self.catalog).dispatch(name, arguments)? {
            Dispatch::Help(query) => Ok(Ran::Help(self.catalog.help(query.as_deref()))),
            Dispatch::Command(call) => {
                if self.catalog.is_dangerous(call.path()) {
                    tracing::warn!(path = %call.descriptor.display_path(), "running a command marked dangerous");
                }
                let result = self.executor.execute(&call, ct).await?;
                tracing::debug!(
                    path = %call.descriptor.display_path(),
                    exit_code = result.exit_code,
                    "command completed"
                );
                Ok(Ran::Command {
                    path: call.descriptor.path,
                    result,
                })
            }
        }
    }
}

enum Ran {
    Help(String),
    Command {
        path: Vec<String>,
        result: ExecuteResult,
    },
}

fn failure_text(res: &ExecuteResult) -> String {
    let mut text = format!(
        "Error: {}\nExit code: {}",
        res.error.as_deref().unwrap_or("command failed"),
        res.exit_code
    );
    if !res.stdout.trim().is_empty() {
        text.push_str("\n\nStdout:\n");
        text.push_str(res.stdout.trim_end());
    }
    if !res.stderr.trim().is_empty() {
        text.push_str("\n\nStderr:\n");
        text.push_str(res.stderr.trim_end());
    }
    text
}

fn warn_terminating(catalog: &Catalog, mode: ExecutionMode) {
    let terminating = catalog.registry().terminating_commands();
    if terminating.is_empty() {
        return;
    }
    let names: Vec<String> = terminating.iter().map(|d| d.display_path()).collect();
    if mode == ExecutionMode::InProcess {
        tracing::warn!(
            commands = %names.join(", "),
            "{} command(s) use a terminating handler and can end the server in in-process mode; \
             prefer a fallible handler or run with auto / sub-process",
            names.len()
        );
    } else {
        tracing::debug!(
            commands = %names.join(", "),
            "{} command(s) use a terminating handler; they run in a subprocess",
            names.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{CLUSTERS_JSON, demo_tree};
    use serde_json::json;

    fn bridge(mode: ExecutionMode) -> ToolBridge {
        let config = ServerConfig {
            intercept_streams: false,
            ..ServerConfig::default().with_mode(mode)
        };
        ToolBridge::new(demo_tree(), config)
    }

    fn args(v: serde_json::Value) -> Option<JsonObject> {
        v.as_object().cloned()
    }

    #[tokio::test]
    async fn in_process_success() {
        let b = bridge(ExecutionMode::InProcess);
        let resp = b
            .call_tool(
                "demo_list",
                args(json!({ "resource": "clusters" })),
                CancellationToken::new(),
            )
            .await;
        assert!(!resp.is_error);
        assert!(resp.joined().contains(CLUSTERS_JSON));
    }

    #[tokio::test]
    async fn validation_errors_become_error_responses() {
        let b = bridge(ExecutionMode::InProcess);
        let resp = b
            .call_tool(
                "demo_create",
                args(json!({ "resource": "cluster", "flags": { "name": "test" } })),
                CancellationToken::new(),
            )
            .await;
        assert!(resp.is_error);
        assert_eq!(
            resp.joined(),
            "invalid flags: MissingRequiredFlag: 'region'; MissingRequiredFlag: 'size'"
        );
    }

    #[tokio::test]
    async fn failed_command_reports_output_sections() {
        let b = bridge(ExecutionMode::InProcess);
        let resp = b.call_tool("demo_fail", None, CancellationToken::new()).await;
        assert!(resp.is_error);
        let text = resp.joined();
        assert!(text.starts_with("Error: boom\nExit code: 1"), "{text}");
        assert!(text.contains("Stdout:\npartial"));
    }

    #[tokio::test]
    async fn execute_maps_failure_to_command_execution() {
        let b = bridge(ExecutionMode::InProcess);
        let err = b.execute("demo_fail", &JsonObject::new()).await.unwrap_err();
        match err {
            Error::CommandExecution { path, result } => {
                assert_eq!(path, vec!["fail"]);
                assert_eq!(result.exit_code, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn help_tool_never_executes() {
        let b = bridge(ExecutionMode::InProcess);
        let resp = b
            .call_tool(
                "demo_help",
                args(json!({ "command": "crash" })),
                CancellationToken::new(),
            )
            .await;
        assert!(!resp.is_error);
        assert!(resp.joined().contains("Command: demo crash"));
    }

    #[test]
    fn list_tools_is_cached() {
        let b = bridge(ExecutionMode::SubProcess);
        assert!(std::ptr::eq(b.list_tools(), b.list_tools()));
    }

    #[test]
    fn reconfigure_rebuilds_catalog() {
        let mut b = bridge(ExecutionMode::SubProcess);
        assert!(b.catalog().get("demo_create").is_some());
        b.reconfigure(ServerConfig {
            actions: Some(vec!["list".into()]),
            ..ServerConfig::default()
        });
        assert!(b.catalog().get("demo_create").is_none());
        assert!(b.catalog().get("demo_list").is_some());
    }

    #[test]
    fn failure_text_omits_empty_sections() {
        let res = ExecuteResult {
            stdout: String::new(),
            stderr: "boom\n".into(),
            exit_code: 2,
            error: Some("exit status 2".into()),
        };
        assert_eq!(
            failure_text(&res),
            "Error: exit status 2\nExit code: 2\n\nStderr:\nboom"
        );
    }
}
