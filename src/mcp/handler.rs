//! MCP server handler, shared application state, and tool router.

use std::future::Future;
use std::sync::Arc;

use rmcp::handler::server::{
    tool::{ToolCallContext, ToolRoute, ToolRouter},
    ServerHandler,
};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use tracing::info_span;

use crate::config::GlobalConfig;
use crate::controller::SessionController;

/// Shared application state accessible by all MCP tool handlers.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Session registry and request dispatcher.
    pub controller: Arc<SessionController>,
}

/// MCP server implementation exposing the persistent `shell` tool.
pub struct ShellServer {
    state: Arc<AppState>,
    session_override: Option<String>,
}

impl ShellServer {
    /// Create a new MCP server bound to shared application state.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            session_override: None,
        }
    }

    /// Create a server whose requests default to a fixed session id.
    ///
    /// Used by the SSE transport so each connection can pin its own
    /// registry key via a query parameter.
    #[must_use]
    pub fn with_session_id(state: Arc<AppState>, session_override: Option<String>) -> Self {
        Self {
            state,
            session_override,
        }
    }

    /// Access the shared application state.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Session id pinned by the transport, if any.
    #[must_use]
    pub fn session_override(&self) -> Option<&str> {
        self.session_override.as_deref()
    }

    fn tool_router() -> ToolRouter<Self> {
        let mut router = ToolRouter::new();

        for tool in Self::all_tools() {
            let name = tool.name.to_string();
            if name.as_str() == "shell" {
                router.add_route(ToolRoute::new_dyn(tool, |context| {
                    Box::pin(crate::mcp::tools::shell::handle(context))
                }));
            } else {
                router.add_route(ToolRoute::new_dyn(tool, |_context| {
                    Box::pin(async {
                        Err(rmcp::ErrorData::internal_error(
                            "tool not implemented",
                            None,
                        ))
                    })
                }));
            }
        }

        router
    }

    /// Convert a `serde_json::Value::Object` into the `Arc<Map>` expected by `Tool`.
    fn schema(value: serde_json::Value) -> Arc<serde_json::Map<String, serde_json::Value>> {
        match value {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::default()),
        }
    }

    /// All tools served, with their input schemas.
    #[must_use]
    pub fn all_tools() -> Vec<Tool> {
        vec![Tool {
            name: "shell".into(),
            description: Some(
                "Execute shell commands in a persistent session. Working directory, \
                 environment variables, and background jobs persist across calls. \
                 Some commands are banned for security; a banned command returns an \
                 error listing the restriction. Limitations: no interactive commands \
                 (vim, less, password prompts), no GUI applications, no streaming — \
                 results are returned after completion, and large outputs may be \
                 truncated by the client."
                    .into(),
            ),
            input_schema: Self::schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to be executed."
                    },
                    "restart": {
                        "type": "boolean",
                        "description": "When true, the shell session will be restarted. Any provided commands will be ignored."
                    },
                    "stop": {
                        "type": "boolean",
                        "description": "When true, the shell session will be stopped. Any provided commands will be executed before the session is stopped."
                    },
                    "session_id": {
                        "type": "string",
                        "description": "Identifier selecting the caller's session. Callers omitting it share the default session."
                    }
                }
            })),
            output_schema: None,
            annotations: None,
            title: None,
            icons: None,
            meta: None,
        }]
    }
}

impl ServerHandler for ShellServer {
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, rmcp::ErrorData>> + Send + '_ {
        let router = Self::tool_router();
        let _span = info_span!("call_tool", tool = %request.name).entered();

        async move {
            router
                .call(ToolCallContext::new(self, request, context))
                .await
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, rmcp::ErrorData>> + Send + '_ {
        let tools = Self::all_tools();

        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }
}
