//! WebSocket endpoints feeding the connection manager.
//!
//! Each socket is decoupled from broadcasts by an unbounded channel: a
//! forwarding task owns the sink, and the manager only ever sends into the
//! channel. When the forwarder dies the next broadcast send fails and the
//! manager evicts the client.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::Uri,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::realtime::{ConnectionManager, ManagerStats, StreamKind};

use super::ApiState;

pub(super) async fn inventory(
    State(state): State<ApiState>,
    ws: WebSocketUpgrade,
    uri: Uri,
) -> Response {
    upgrade(state.manager, ws, uri, StreamKind::Inventory)
}

pub(super) async fn price(
    State(state): State<ApiState>,
    ws: WebSocketUpgrade,
    uri: Uri,
) -> Response {
    upgrade(state.manager, ws, uri, StreamKind::Price)
}

pub(super) async fn alerts(
    State(state): State<ApiState>,
    ws: WebSocketUpgrade,
    uri: Uri,
) -> Response {
    upgrade(state.manager, ws, uri, StreamKind::Alerts)
}

pub(super) async fn stats(State(state): State<ApiState>) -> Json<ManagerStats> {
    Json(state.manager.stats().await)
}

fn upgrade(
    manager: Arc<ConnectionManager>,
    ws: WebSocketUpgrade,
    uri: Uri,
    fallback: StreamKind,
) -> Response {
    let kind = StreamKind::from_path(uri.path(), fallback);
    ws.on_upgrade(move |socket| handle_socket(manager, socket, kind))
}

async fn handle_socket(manager: Arc<ConnectionManager>, socket: WebSocket, kind: StreamKind) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let client_id = manager.register(kind, tx.clone()).await;

    let forwarder = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                let text = text.as_str();
                debug!(connection_type = kind.as_str(), text, "websocket message received");
                // Echo for connection tests; broadcasts flow through `tx`.
                if tx.send(format!("Message received: {text}")).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    manager.disconnect(client_id).await;
    forwarder.abort();
}
