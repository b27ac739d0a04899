//! Pushes the dashboard state to WebSocket clients.
//!
//! Every client receives the current state right after the upgrade and again after
//! every change. Incoming messages other than close are ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::state::GuardedSyncCore;
use crate::sync::ViewState;

pub const DASHBOARD_STATE_MESSAGE: &str = "dashboard_state";

#[derive(Serialize)]
struct ServerMessage<'a, T: Serialize> {
    #[serde(rename = "type")]
    msg_type: &'a str,
    payload: T,
}

fn encode_state(state: &ViewState) -> Option<String> {
    let message = ServerMessage {
        msg_type: DASHBOARD_STATE_MESSAGE,
        payload: state,
    };
    match serde_json::to_string(&message) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to encode dashboard state: {}", e);
            None
        }
    }
}

/// Route handler for `GET /v1/dashboard/ws`.
pub async fn dashboard_ws_handler(
    ws: WebSocketUpgrade,
    State(sync_core): State<GuardedSyncCore>,
) -> Response {
    let states = sync_core.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, states))
}

async fn handle_socket(socket: WebSocket, mut states: watch::Receiver<ViewState>) {
    debug!("Dashboard WebSocket connected");
    let (mut sink, mut stream) = socket.split();

    let initial = encode_state(&states.borrow_and_update());
    if let Some(text) = initial {
        if sink.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = encode_state(&states.borrow_and_update());
                if let Some(text) = text {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Dashboard WebSocket error: {}", e);
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
    debug!("Dashboard WebSocket disconnected");
}
