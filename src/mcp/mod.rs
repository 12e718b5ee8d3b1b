//! MCP protocol adapter over `ToolBridge`.
//!
//! McpServer -> rmcp::ServerHandler
//!   list_tools : catalog -> rmcp `Tool`s (cached, same order every time)
//!   call_tool  : arguments + request cancellation -> ToolBridge::call_tool
//! serve_stdio runs the handler on stdin/stdout until the client disconnects.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ListToolsResult, PaginatedRequestParam,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};

use crate::bridge::{ToolBridge, ToolResponse};
use crate::catalog::ToolDefinition;

#[derive(Clone)]
pub struct McpServer {
    bridge: Arc<ToolBridge>,
    tools: Arc<Vec<Tool>>,
}

impl McpServer {
    pub fn new(bridge: ToolBridge) -> Self {
        let tools = bridge.list_tools().iter().map(to_rmcp_tool).collect();
        Self {
            bridge: Arc::new(bridge),
            tools: Arc::new(tools),
        }
    }

    pub fn bridge(&self) -> &ToolBridge {
        &self.bridge
    }

    fn instructions(&self) -> String {
        let catalog = self.bridge.catalog();
        let mut text = format!(
            "Tools for the '{}' command line. Each action tool takes a 'resource', \
             a 'flags' object and optional positional 'args'. Call {} to inspect a command \
             before running it.",
            catalog.root_name(),
            catalog.help_tool_name()
        );
        let dangerous = catalog.dangerous_commands();
        if !dangerous.is_empty() {
            text.push_str(&format!(
                "\n\nDANGEROUS commands (confirm with the user first): {}.",
                dangerous.join(", ")
            ));
        }
        text
    }
}

pub fn to_rmcp_tool(def: &ToolDefinition) -> Tool {
    Tool::new(
        def.name.clone(),
        def.description.clone(),
        Arc::new(def.input_schema.clone()),
    )
}

pub fn to_call_result(resp: ToolResponse) -> CallToolResult {
    let content = resp.content.into_iter().map(Content::text).collect();
    if resp.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        let config = self.bridge.config();
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info.name = config.name.clone();
        info.server_info.version = config.version.clone();
        info.instructions = Some(self.instructions());
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools.as_ref().clone()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let resp = self
            .bridge
            .call_tool(&request.name, request.arguments, context.ct.clone())
            .await;
        Ok(to_call_result(resp))
    }
}

/// Serve `bridge` over stdio until the peer closes the connection.
pub async fn serve_stdio(bridge: ToolBridge) -> Result<()> {
    let server = McpServer::new(bridge);
    tracing::info!(
        tools = server.tools.len(),
        mode = %server.bridge.config().execution_mode,
        "MCP server listening on stdio"
    );
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP stdio service")?;
    service.waiting().await.context("MCP service terminated abnormally")?;
    tracing::info!("MCP client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::demo::demo_tree;

    fn server(config: ServerConfig) -> McpServer {
        McpServer::new(ToolBridge::new(demo_tree(), config))
    }

    #[test]
    fn tools_mirror_catalog() {
        let s = server(ServerConfig::default());
        let names: Vec<&str> = s.tools.iter().map(|t| t.name.as_ref()).collect();
        let expected: Vec<&str> = s
            .bridge()
            .list_tools()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, expected);
        let create = s.tools.iter().find(|t| t.name == "demo_create").unwrap();
        assert_eq!(create.input_schema["required"], serde_json::json!(["resource"]));
    }

    #[test]
    fn info_reports_config_and_dangerous_commands() {
        let s = server(ServerConfig {
            name: "demo-mcp".into(),
            dangerous_commands: vec!["delete".into()],
            ..ServerConfig::default()
        });
        let info = s.get_info();
        assert_eq!(info.server_info.name, "demo-mcp");
        assert!(info.capabilities.tools.is_some());
        let instructions = info.instructions.unwrap();
        assert!(instructions.contains("demo_help"));
        assert!(instructions.contains("DANGEROUS commands (confirm with the user first): delete."));
    }

    #[test]
    fn error_responses_keep_error_flag() {
        let ok = to_call_result(ToolResponse::text("fine"));
        assert_eq!(ok.is_error, Some(false));
        let err = to_call_result(ToolResponse::error("bad"));
        assert_eq!(err.is_error, Some(true));
    }
}
