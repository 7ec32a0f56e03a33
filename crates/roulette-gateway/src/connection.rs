//! Actor-per-connection bridging one WebSocket to the engine.
//!
//! The socket is split into reader and writer halves. The writer task owns
//! the sink and forwards events from an mpsc channel, so per-connection send
//! order is exactly submission order. The reader loop parses inbound frames
//! and dispatches them; a frame that does not parse is a protocol error and
//! is dropped without disconnecting the sender. When the reader loop ends —
//! clean close or transport error — the engine runs the disconnect path.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use roulette_common::{ClientEvent, ServerEvent};

use crate::GatewayState;

/// Run one connection to completion.
pub(crate) async fn run(socket: WebSocket, state: Arc<GatewayState>) {
    let (ws_sink, ws_stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn_id = state.engine.connect(tx);
    tracing::info!(conn = %conn_id, "websocket accepted");

    let writer = tokio::spawn(write_loop(ws_sink, rx));
    read_loop(ws_stream, &state, conn_id).await;

    // Reader is done: clean close, error, or stream end all mean the same
    // thing to the engine.
    state.engine.disconnect(conn_id);
    writer.abort();
    tracing::info!(conn = %conn_id, "websocket closed");
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    state: &Arc<GatewayState>,
    conn_id: roulette_common::ConnectionId,
) {
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => state.engine.handle(conn_id, event),
                Err(error) => {
                    tracing::debug!(conn = %conn_id, %error, "malformed frame dropped");
                }
            },
            Message::Close(_) => break,
            // Binary frames are not part of the protocol; ping/pong is
            // handled by the WebSocket layer itself.
            _ => {}
        }
    }
}

/// Serialize outbound events and push them down the sink in order.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: UnboundedReceiver<ServerEvent>,
) {
    while let Some(event) = rx.recv().await {
        let Ok(json) = serde_json::to_string(&event) else {
            continue;
        };
        if sink.send(Message::Text(json.into())).await.is_err() {
            // Connection is gone; the reader side tears everything down.
            break;
        }
    }
}
