//! HTTP/SSE transport for remote connections.
//!
//! Mounts an [`SseServer`] behind an axum router so that remote callers
//! can connect over HTTP with Server-Sent Events streaming.
//!
//! The SSE endpoint accepts an optional `session_id` query parameter
//! (e.g. `/sse?session_id=worker-2`) so that each connection can pin its
//! own entry in the session registry instead of sharing the default.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use rmcp::transport::sse_server::{SseServer, SseServerConfig};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::handler::{AppState, ShellServer};
use crate::{AppError, Result};

/// Handler for `GET /health` — returns 200 OK with a plain-text body.
///
/// Useful for probing liveness without initiating an SSE or MCP session.
async fn health() -> &'static str {
    "ok"
}

/// Extract `session_id` from a URI query string.
///
/// Returns `None` when the parameter is absent or empty.
fn extract_session_id(uri: &axum::http::Uri) -> Option<String> {
    uri.query().and_then(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == "session_id")
            .map(|(_, v)| v.to_owned())
            .filter(|v| !v.is_empty())
    })
}

/// Start the HTTP/SSE MCP transport on `config.http_port`.
///
/// Each SSE connection creates a fresh [`ShellServer`] sharing the same
/// [`AppState`]. When the client connects with a `session_id` query
/// parameter, that id becomes the connection's default registry key.
///
/// # Errors
///
/// Returns `AppError::Mcp` if the server fails to bind.
pub async fn serve_sse(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let port = state.config.http_port;
    let bind = SocketAddr::from(([127, 0, 0, 1], port));

    let config = SseServerConfig {
        bind,
        sse_path: "/sse".into(),
        post_path: "/message".into(),
        ct: ct.clone(),
        sse_keep_alive: None,
    };

    let (sse_server, router) = SseServer::new(config);
    let router = router.route("/health", get(health));

    // Shared inbox: the middleware writes the `session_id` extracted from
    // the query string; the factory closure reads it when creating the
    // per-connection ShellServer. A semaphore serialises SSE connection
    // establishment so the inbox value is never clobbered by a
    // concurrent connection.
    let session_inbox: Arc<std::sync::Mutex<Option<String>>> =
        Arc::new(std::sync::Mutex::new(None));
    let connection_semaphore = Arc::new(Semaphore::new(1));

    // Each inbound SSE connection gets its own ShellServer instance.
    let inbox_for_factory = Arc::clone(&session_inbox);
    let server_ct = {
        let state = Arc::clone(&state);
        sse_server.with_service(move || {
            let session_override = inbox_for_factory
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take();
            if let Some(ref sid) = session_override {
                info!(session_id = %sid, "SSE connection pinned to session");
            }
            ShellServer::with_session_id(Arc::clone(&state), session_override)
        })
    };

    // Middleware: extract `session_id` from the query string on `/sse`
    // requests and store it in the inbox while holding the semaphore.
    let inbox_for_mw = Arc::clone(&session_inbox);
    let sem_for_mw = Arc::clone(&connection_semaphore);
    let router = router.layer(middleware::from_fn(move |request: Request, next: Next| {
        let inbox = Arc::clone(&inbox_for_mw);
        let sem = Arc::clone(&sem_for_mw);
        async move {
            let is_sse = request.uri().path() == "/sse";
            if is_sse {
                // Serialise so the inbox value is consumed by exactly
                // the factory call that corresponds to this request.
                let Ok(_permit) = sem.acquire().await else {
                    warn!("connection semaphore closed; skipping session override");
                    return next.run(request).await;
                };
                let session_id = extract_session_id(request.uri());
                *inbox
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner) = session_id;
                let response: Response = next.run(request).await;
                // _permit drops here after the factory has consumed the inbox
                response
            } else {
                next.run(request).await
            }
        }
    }));

    // Serve HTTP via axum.
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Mcp(format!("failed to bind SSE on {bind}: {err}")))?;

    info!(%bind, "starting HTTP/SSE MCP transport");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            ct.cancelled().await;
            server_ct.cancel();
        })
        .await
        .map_err(|err| AppError::Mcp(format!("SSE server error: {err}")))?;

    info!("HTTP/SSE MCP transport shut down");
    Ok(())
}
