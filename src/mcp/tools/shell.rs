//! `shell` MCP tool handler.
//!
//! Thin glue between the MCP tool surface and the session controller:
//! deserializes the request, resolves the effective session id (explicit
//! argument wins over the transport override), and maps the controller's
//! text blocks or error into the MCP result.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::{CallToolResult, Content};
use tracing::{info_span, Instrument};

use crate::controller::ShellRequest;
use crate::mcp::handler::ShellServer;
use crate::AppError;

/// Input parameters of the `shell` tool.
#[derive(Debug, serde::Deserialize)]
struct ShellInput {
    /// Command line to execute.
    command: Option<String>,
    /// Restart the session, discarding state.
    #[serde(default)]
    restart: bool,
    /// Stop the session after any command completes.
    #[serde(default)]
    stop: bool,
    /// Registry key selecting the caller's session.
    session_id: Option<String>,
}

/// Handle the `shell` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData::invalid_params` for malformed input or an
/// empty request, and `rmcp::ErrorData::internal_error` for session
/// failures that are not folded into the response text.
pub async fn handle(
    context: ToolCallContext<'_, ShellServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let state = Arc::clone(context.service.state());
    let session_override = context.service.session_override().map(str::to_owned);
    let args: serde_json::Map<String, serde_json::Value> = context.arguments.unwrap_or_default();

    let input: ShellInput =
        serde_json::from_value(serde_json::Value::Object(args)).map_err(|err| {
            rmcp::ErrorData::invalid_params(format!("invalid shell parameters: {err}"), None)
        })?;

    let span = info_span!(
        "shell",
        restart = input.restart,
        stop = input.stop,
        has_command = input.command.is_some(),
    );

    async move {
        let request = ShellRequest {
            command: input.command,
            restart: input.restart,
            stop: input.stop,
            session_id: input.session_id.or(session_override),
        };

        match state.controller.handle(request).await {
            Ok(response) => Ok(CallToolResult::success(
                response.blocks.into_iter().map(Content::text).collect(),
            )),
            Err(err @ AppError::NoCommandProvided) => {
                Err(rmcp::ErrorData::invalid_params(err.to_string(), None))
            }
            Err(err) => Err(rmcp::ErrorData::internal_error(err.to_string(), None)),
        }
    }
    .instrument(span)
    .await
}
