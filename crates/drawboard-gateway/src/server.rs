//! Axum HTTP and WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{ConnectInfo, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::connection::handle_ws_connection;
use crate::methods::{dispatch_method, http_status};
use crate::state::GatewayState;

type Shared = State<Arc<GatewayState>>;
type Peer = ConnectInfo<SocketAddr>;

/// Build the router: the viewer socket, health, and the REST control surface.
pub fn router(state: Arc<GatewayState>) -> Router {
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/api/canvas", get(canvas_snapshot))
        .route("/api/ai", get(agent_status))
        .route("/api/agent/register", post(agent_register))
        .route("/api/ai/start", post(agent_start))
        .route("/api/ai/stop", post(agent_stop))
        .route("/api/ai/message", post(agent_message))
        .route("/api/draw", post(canvas_draw))
        .route("/api/ask", post(canvas_ask));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(metrics_handler));

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway and serve until Ctrl-C, then stop every session.
pub async fn start_gateway(state: Arc<GatewayState>, port: u16) -> anyhow::Result<()> {
    let bind_addr = state.config.bind_addr();
    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");

    let sweeper = {
        let state = state.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(60));
            loop {
                tick.tick().await;
                state.limits.sweep();
            }
        })
    };

    let app = router(state.clone());
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    let stopped = state.agents.stop_all();
    info!(stopped, "Gateway stopped");
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): Shared, ConnectInfo(remote): Peer) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(state, socket, remote))
}

async fn health_handler(State(state): Shared) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "viewers": state.viewers.len(),
        "events": state.log.len(),
        "agents": state.agents.running_count(),
    }))
}

#[cfg(feature = "metrics")]
async fn metrics_handler(State(state): Shared) -> Response {
    match &state.metrics {
        Some(handle) => {
            crate::metrics::record_snapshot(&state);
            handle.render().into_response()
        }
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

// ============================================================
// REST control surface
// ============================================================

/// Run a method for a REST caller and map the outcome to an HTTP response.
async fn rest_call(state: Arc<GatewayState>, remote: SocketAddr, method: &str, params: Value) -> Response {
    match dispatch_method(&state, remote.ip(), method, params).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(error) => {
            let status = http_status(&error.code);
            (status, Json(json!({ "error": error }))).into_response()
        }
    }
}

async fn canvas_snapshot(State(state): Shared, ConnectInfo(remote): Peer) -> Response {
    rest_call(state, remote, "canvas.snapshot", Value::Null).await
}

async fn agent_status(State(state): Shared, ConnectInfo(remote): Peer) -> Response {
    rest_call(state, remote, "agent.status", Value::Null).await
}

async fn agent_register(State(state): Shared, ConnectInfo(remote): Peer, Json(body): Json<Value>) -> Response {
    rest_call(state, remote, "agent.register", body).await
}

async fn agent_start(State(state): Shared, ConnectInfo(remote): Peer, Json(body): Json<Value>) -> Response {
    rest_call(state, remote, "agent.start", body).await
}

async fn agent_stop(State(state): Shared, ConnectInfo(remote): Peer, Json(body): Json<Value>) -> Response {
    rest_call(state, remote, "agent.stop", body).await
}

async fn agent_message(State(state): Shared, ConnectInfo(remote): Peer, Json(body): Json<Value>) -> Response {
    rest_call(state, remote, "agent.message", body).await
}

async fn canvas_draw(State(state): Shared, ConnectInfo(remote): Peer, Json(body): Json<Value>) -> Response {
    rest_call(state, remote, "canvas.draw", body).await
}

async fn canvas_ask(State(state): Shared, ConnectInfo(remote): Peer, Json(body): Json<Value>) -> Response {
    rest_call(state, remote, "canvas.ask", body).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(%e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
