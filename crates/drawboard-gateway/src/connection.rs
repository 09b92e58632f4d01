//! Viewer WebSocket lifecycle: handshake, write queue, read loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use drawboard_canvas::{ClientMessage, ErrorShape, ServerMessage};

use crate::methods::dispatch_method;
use crate::state::GatewayState;

/// Handle a new viewer connection.
///
/// The handshake (`sync` then `cursors`) is queued and the viewer registered
/// under the registry lock, so every later broadcast lands after it in the
/// same queue.
pub async fn handle_ws_connection(state: Arc<GatewayState>, ws: WebSocket, remote: SocketAddr) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (queue_tx, mut queue_rx) = mpsc::channel::<String>(state.config.outbound_buffer());

    let conn_id = match state.viewers.attach(queue_tx, || {
        vec![
            ServerMessage::Sync {
                events: state.log.snapshot(),
            },
            ServerMessage::Cursors {
                cursors: state.agents.cursor_map(),
            },
        ]
    }) {
        Ok(id) => id,
        Err(e) => {
            warn!(%remote, %e, "Viewer handshake failed");
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };
    info!(conn_id = %conn_id, %remote, viewers = state.viewers.len(), "Viewer connected");

    #[cfg(feature = "metrics")]
    crate::metrics::record_viewer_connect();

    // Drains the queue onto the socket. Ends when the registry drops the
    // sender, which is how a slow viewer gets disconnected.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = queue_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                return;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            _ = &mut send_task => {
                debug!(conn_id = %conn_id, "Writer finished");
                break;
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, &conn_id, remote, text.as_str());
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(conn_id = %conn_id, "Client closed");
                        break;
                    }
                    Some(Err(e)) => {
                        error!(conn_id = %conn_id, %e, "WebSocket error");
                        break;
                    }
                    // Axum answers pings itself
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    send_task.abort();
    state.viewers.unregister(&conn_id);
    info!(conn_id = %conn_id, viewers = state.viewers.len(), "Viewer disconnected");
}

/// Answer one client frame. Requests run on their own task so a long
/// `canvas.ask` does not hold up the read loop.
fn handle_frame(state: &Arc<GatewayState>, conn_id: &str, remote: SocketAddr, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => reply(state, conn_id, ServerMessage::Pong),
        Ok(ClientMessage::Req { id, method, params }) => {
            let state = state.clone();
            let conn_id = conn_id.to_string();
            tokio::spawn(async move {
                let response = match dispatch_method(&state, remote.ip(), &method, params).await {
                    Ok(payload) => ServerMessage::ok(&id, payload),
                    Err(error) => ServerMessage::err(&id, error),
                };
                reply(&state, &conn_id, response);
            });
        }
        Err(e) => {
            warn!(conn_id = %conn_id, %e, "Invalid frame received");
            reply(
                state,
                conn_id,
                ServerMessage::err("unknown", ErrorShape::new("invalid_params", format!("Invalid frame: {e}"))),
            );
        }
    }
}

fn reply(state: &GatewayState, conn_id: &str, msg: ServerMessage) {
    if let Err(e) = state.viewers.send(conn_id, &msg) {
        debug!(conn_id = %conn_id, %e, "Reply dropped");
    }
}
