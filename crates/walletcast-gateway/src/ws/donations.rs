use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app::AppState;

/// GET /donations: legacy listener socket, receives namespace events only.
pub async fn donations_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_listener(socket, state))
}

async fn run_listener(socket: WebSocket, state: Arc<AppState>) {
    let mut events = state.donations.subscribe();
    let (mut sink, mut rx) = socket.split();
    let write_timeout = Duration::from_millis(state.config.server.write_timeout_ms);
    info!(listeners = state.donations.listeners(), "donation listener attached");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(json) => {
                    let frame = Message::Text(json.into());
                    let sent = tokio::time::timeout(write_timeout, sink.send(frame)).await;
                    if !matches!(sent, Ok(Ok(()))) {
                        debug!("donation listener write failed");
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "donation listener lagged"),
                Err(RecvError::Closed) => break,
            },

            msg = rx.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },

            _ = state.shutdown.cancelled() => break,
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    debug!("donation listener detached");
}
