//! WebSocket observers
//!
//! Each socket is registered on the observer bus as a bounded channel
//! sink. Inbound text frames are operator commands.

use super::types::{ActionResponse, ObserverCommand};
use super::AppState;
use crate::coordinator::Coordinator;
use crate::observer::{EventSink, ObserverKey};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Observe every session
pub async fn ws_global(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_observer(socket, state, ObserverKey::Global))
}

/// Observe a single session
pub async fn ws_session(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| serve_observer(socket, state, ObserverKey::Session(session_id)))
}

async fn serve_observer(socket: WebSocket, state: AppState, key: ObserverKey) {
    let coordinator = state.coordinator.clone();
    let observers = coordinator.observers().clone();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<String>(state.sink_buffer);

    // The bus owns the only long-lived sender, so pruning the sink ends
    // the writer below and closes the socket.
    let snapshot_tx = frame_tx.clone();
    // Command replies go through a weak handle for the same reason
    let reply_tx = frame_tx.downgrade();
    let sink_id = observers.register(key.clone(), Arc::new(frame_tx));

    let snapshot = match &key {
        ObserverKey::Global => Some(coordinator.initial_state()),
        ObserverKey::Session(id) => coordinator.session_state(id),
    };
    if let Some(event) = snapshot {
        if let Err(e) = snapshot_tx.push(&event.to_frame()) {
            tracing::warn!(?key, error = %e, "Failed to send initial snapshot");
        }
    }
    drop(snapshot_tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let command_key = key.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let reply = handle_command(&coordinator, &command_key, &text);
                    let Some(tx) = reply_tx.upgrade() else { break };
                    if let Ok(frame) = serde_json::to_string(&reply) {
                        if tx.try_send(frame).is_err() {
                            tracing::debug!(key = ?command_key, "Dropped command reply");
                        }
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    observers.deregister(&key, sink_id);
    tracing::debug!(?key, "Observer socket closed");
}

fn handle_command(coordinator: &Coordinator, key: &ObserverKey, text: &str) -> ActionResponse {
    let command: ObserverCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(?key, error = %e, "Ignoring malformed observer command");
            return ActionResponse::failed(format!("Invalid command: {e}"));
        }
    };

    let implicit_id = match key {
        ObserverKey::Session(id) => Some(id.as_str()),
        ObserverKey::Global => None,
    };

    let (session_id, success_message) = match &command {
        ObserverCommand::Instruct { session_id, .. } => (session_id, "Instruction sent"),
        ObserverCommand::TapOut { session_id } => (session_id, "Tap out signal sent"),
    };
    let Some(id) = session_id.as_deref().or(implicit_id) else {
        tracing::warn!(?command, "Observer command without a session id");
        return ActionResponse::failed("session_id is required");
    };

    let result = match &command {
        ObserverCommand::Instruct { instruction, .. } => {
            coordinator.send_instruction(id, instruction)
        }
        ObserverCommand::TapOut { .. } => coordinator.tap_out(id),
    };

    match result {
        Ok(()) => ActionResponse::ok(success_message),
        Err(e) => {
            tracing::warn!(?command, error = %e, "Observer command rejected");
            ActionResponse::failed(e.to_string())
        }
    }
}
