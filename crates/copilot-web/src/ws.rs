//! WebSocket upgrade handler and message dispatch.
//!
//! Each connected client receives:
//! 1. A full [`UiStateSnapshot`] on connect.
//! 2. Incremental [`WsMessage`] updates as pipeline events fire.
//!
//! Clients send JSON commands back: submit a context, cancel the run, or
//! clear the session.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::broadcast::WsMessage;
use crate::session::Session;

/// A command sent from a client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Submit {
        #[serde(alias = "patientContext")]
        patient_context: String,
    },
    Cancel,
    Clear,
}

/// GET /ws: WebSocket upgrade handler.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(session): State<Session>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, session))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, session: Session) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before the snapshot so nothing between the two is lost.
    let mut broadcast_rx = session.subscribe();

    let snapshot_msg = WsMessage::Snapshot {
        data: session.snapshot().to_json(),
    };
    if ws_send(&mut sink, &snapshot_msg).await.is_err() {
        return;
    }

    debug!("WebSocket client connected");

    // Replies to this client's rejected commands go through the same sink.
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::channel::<WsMessage>(8);

    let resync = session.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                received = broadcast_rx.recv() => match received {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Client fell behind; a fresh snapshot resynchronizes it.
                        warn!("WebSocket client lagged by {n} messages, resending snapshot");
                        WsMessage::Snapshot {
                            data: resync.snapshot().to_json(),
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(reply) = reply_rx.recv() => reply,
            };
            if ws_send(&mut sink, &msg).await.is_err() {
                break; // Client disconnected.
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                if let Some(reply) = handle_client_message(&text, &session).await {
                    let _ = reply_tx.send(reply).await;
                }
            }
            Message::Close(_) => break,
            _ => {} // Ignore binary, ping, pong.
        }
    }

    debug!("WebSocket client disconnected");
    forward_task.abort();
}

/// Process a JSON command. Returns an error message for this client when
/// the command is rejected.
async fn handle_client_message(text: &str, session: &Session) -> Option<WsMessage> {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(text) else {
        debug!("Ignoring malformed WebSocket message");
        return None;
    };

    let rejected = match msg {
        ClientMessage::Submit { patient_context } => {
            session.submit(&patient_context).err().map(|e| e.to_string())
        }
        ClientMessage::Cancel => (!session.cancel().await).then(|| "No run in progress".to_string()),
        ClientMessage::Clear if !session.clear_enabled() => Some("Clear is disabled".to_string()),
        ClientMessage::Clear => session.clear().err().map(|e| e.to_string()),
    };
    rejected.map(|message| WsMessage::Error { message })
}

/// Serialize a `WsMessage` and send it over the WebSocket sink.
async fn ws_send(sink: &mut SplitSink<WebSocket, Message>, msg: &WsMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).unwrap_or_default();
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
