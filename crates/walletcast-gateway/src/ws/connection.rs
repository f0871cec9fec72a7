use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::StreamExt;
use tracing::{debug, info, warn};
use walletcast_core::config::MAX_PAYLOAD_BYTES;
use walletcast_core::types::ClientId;

use crate::app::AppState;
use crate::ws::{message, send};

/// Axum handler: upgrades HTTP to WebSocket at GET /.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_PAYLOAD_BYTES)
        .on_upgrade(|socket| run_connection(socket, state))
}

/// Per-connection read loop: lives for the entire WS session.
///
/// The socket is split: this task reads client frames and turns them into
/// Hub commands, a spawned writer owns the sink. Whichever side ends first
/// ends the session, and the client is unregistered exactly once here.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let client_id = ClientId::new();
    let outbound = match state.hub.connect(client_id).await {
        Ok(rx) => rx,
        Err(e) => {
            warn!(%client_id, error = %e, "hub unavailable, refusing connection");
            return;
        }
    };
    info!(%client_id, "new WS connection");

    let (sink, mut rx) = socket.split();
    let writer_config = send::WriterConfig {
        write_timeout: Duration::from_millis(state.config.server.write_timeout_ms),
        heartbeat: Duration::from_secs(state.config.server.heartbeat_interval_secs.max(1)),
    };
    let mut writer = tokio::spawn(send::run_writer(client_id, sink, outbound, writer_config));
    let mut writer_done = false;

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > MAX_PAYLOAD_BYTES {
                            warn!(%client_id, size = text.len(), "payload too large");
                            break;
                        }
                        if message::handle(client_id, text.as_str(), &state.hub).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(%client_id, error = %e, "socket read failed");
                        break;
                    }
                    _ => {}
                }
            }

            _ = &mut writer => {
                writer_done = true;
                break;
            }

            _ = state.shutdown.cancelled() => break,
        }
    }

    // Dropping the Hub's entry closes the outbound queue, which stops the writer.
    let _ = state.hub.unregister(client_id).await;
    if !writer_done {
        let _ = writer.await;
    }
    info!(%client_id, "WS connection closed");
}
