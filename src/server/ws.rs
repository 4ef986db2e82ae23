//! Live submission channel.
//!
//! Client sends `{"type":"submit","payload":{...}}`; the server answers with
//! one `{"type":"log","line":...}` per log line and a single
//! `{"type":"complete","success":...}`.

use super::ServerState;
use crate::core::logger::LogSink;
use crate::core::pipeline::fields_from_json;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

pub(super) async fn handle_upgrade(
    State(state): State<Arc<ServerState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let request: Value = match serde_json::from_str(text.as_str()) {
            Ok(value) => value,
            Err(_) => {
                if send_error(&mut socket, "Invalid JSON payload.").await.is_err() {
                    break;
                }
                continue;
            }
        };
        if request.get("type").and_then(Value::as_str) != Some("submit") {
            continue;
        }
        let payload = match request.get("payload") {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                if send_error(&mut socket, "Invalid form payload.").await.is_err() {
                    break;
                }
                continue;
            }
        };
        if !stream_submission(&mut socket, &state, payload).await {
            break;
        }
    }
}

/// Run one submission, forwarding its log lines. Returns `false` once the
/// client is gone; the run itself always finishes.
async fn stream_submission(
    socket: &mut WebSocket,
    state: &Arc<ServerState>,
    payload: Map<String, Value>,
) -> bool {
    let fields = fields_from_json(&payload);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let logs = LogSink::with_observer(tx);
    let pipeline = state.pipeline.clone();
    let run = tokio::spawn(async move { pipeline.process_submission(&fields, &logs).await });

    let mut connected = true;
    while let Some(line) = rx.recv().await {
        if connected && send_json(socket, json!({ "type": "log", "line": line })).await.is_err() {
            tracing::debug!("websocket client disconnected; run continues without a listener");
            connected = false;
        }
    }

    let success = match run.await {
        Ok(outcome) => outcome.success,
        Err(err) => {
            tracing::error!("submission task failed: {}", err);
            false
        }
    };
    connected
        && send_json(socket, json!({ "type": "complete", "success": success }))
            .await
            .is_ok()
}

async fn send_error(socket: &mut WebSocket, message: &str) -> Result<(), axum::Error> {
    send_json(socket, json!({ "type": "error", "message": message })).await
}

async fn send_json(socket: &mut WebSocket, value: Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(value.to_string().into())).await
}
