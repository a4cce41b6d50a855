//! Streamable HTTP transport
//!
//! Every JSON-RPC message is POSTed to a single endpoint and answered with a
//! plain JSON body. Notifications and client responses are acknowledged with
//! `202 Accepted`.

use crate::mcp::errors::McpError;
use crate::mcp::protocol::*;
use crate::mcp::server::{McpServer, MessageHandler};
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Header carrying the session identifier issued on initialize
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

#[derive(Clone)]
struct HttpState {
    server: Arc<McpServer>,
}

/// Build the router serving MCP on `path` plus a `/health` probe
#[inline]
pub fn router(server: Arc<McpServer>, path: &str) -> Router {
    let state = HttpState { server };

    Router::new()
        .route(path, post(handle_post))
        .route("/health", get(handle_health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until Ctrl-C
#[inline]
pub async fn serve_http(server: Arc<McpServer>, addr: SocketAddr, path: &str) -> Result<()> {
    let app = router(server, path);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("MCP server listening on http://{}{}", addr, path);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Received interrupt signal, shutting down");
        })
        .await
        .context("HTTP server error")?;

    info!("MCP server stopped");
    Ok(())
}

async fn handle_post(State(state): State<HttpState>, body: Bytes) -> Response {
    let handler = MessageHandler::new(Arc::clone(&state.server));

    let raw_value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            let error = McpError::ParseError {
                message: e.to_string(),
            };
            error.log();
            return Json(error.to_error_response(None)).into_response();
        }
    };
    let is_initialize = raw_value.get("method").and_then(Value::as_str) == Some("initialize");

    let Some(reply) = handler.handle_value(raw_value).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let issue_session = is_initialize && matches!(reply, JsonRpcMessage::Response(_));
    let mut response = Json(reply).into_response();
    if issue_session {
        let session_id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            debug!("Issued session {}", session_id);
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
    }
    response
}

async fn handle_health(State(state): State<HttpState>) -> Json<Value> {
    let health = state.server.health_status().await;
    Json(json!({
        "status": "ok",
        "tools": health.tools_registered,
        "resources": health.resources_registered,
        "prompts": health.prompts_registered,
        "uptime_secs": health.uptime.as_secs(),
    }))
}
