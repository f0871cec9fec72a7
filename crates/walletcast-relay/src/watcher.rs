use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walletcast_core::config::NodeConfig;
use walletcast_core::types::BlockEvent;
use walletcast_protocol::node::{NodeFrame, NodeSubscribe};

use crate::error::{RelayError, Result};

/// How a node session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Cancelled, or nobody is draining the event queue any more.
    Stopped,
    /// The socket closed or failed after a successful subscribe.
    Disconnected,
}

/// Upstream producer: follows the node's confirmation topic and feeds the
/// bounded relay queue, reconnecting with exponential backoff.
pub struct NodeWatcher {
    url: String,
    reconnect_initial: Duration,
    reconnect_max: Duration,
}

impl NodeWatcher {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let url = config
            .ws_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| RelayError::Config("node.ws_url is not set".into()))?;
        Ok(Self {
            url,
            reconnect_initial: Duration::from_millis(config.reconnect_initial_ms.max(1)),
            reconnect_max: Duration::from_millis(config.reconnect_max_ms.max(1)),
        })
    }

    /// Run until `cancel` fires or the relay queue is closed.
    ///
    /// A full queue applies backpressure here: the watcher stops reading the
    /// node socket until the relay catches up.
    pub async fn run(self, events: mpsc::Sender<BlockEvent>, cancel: CancellationToken) {
        let mut backoff = self.reconnect_initial;
        loop {
            info!(url = %self.url, "connecting to node WebSocket");
            match self.session(&events, &cancel).await {
                Ok(SessionEnd::Stopped) => break,
                Ok(SessionEnd::Disconnected) => {
                    backoff = self.reconnect_initial;
                    warn!(url = %self.url, "node WebSocket closed, reconnecting in {backoff:?}");
                }
                Err(e) => {
                    warn!(
                        url = %self.url,
                        error = %e,
                        "node WebSocket failed, retrying in {backoff:?}"
                    );
                }
            }

            tokio::select! {
                _ = time::sleep(backoff) => {}
                _ = cancel.cancelled() => break,
            }
            backoff = (backoff * 2).min(self.reconnect_max);
        }
        info!("node watcher stopped");
    }

    async fn session(
        &self,
        events: &mpsc::Sender<BlockEvent>,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd> {
        let connect = tokio::select! {
            c = tokio_tungstenite::connect_async(self.url.as_str()) => c,
            _ = cancel.cancelled() => return Ok(SessionEnd::Stopped),
        };
        let (ws_stream, _) = connect.map_err(|e| RelayError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = ws_stream.split();

        let subscribe = serde_json::to_string(&NodeSubscribe::confirmations())?;
        sink.send(Message::Text(subscribe.into()))
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;
        info!(url = %self.url, "subscribed to node confirmations");

        loop {
            let msg = tokio::select! {
                m = stream.next() => m,
                _ = cancel.cancelled() => return Ok(SessionEnd::Stopped),
            };
            match msg {
                None | Some(Ok(Message::Close(_))) => return Ok(SessionEnd::Disconnected),
                Some(Err(e)) => {
                    warn!(url = %self.url, error = %e, "node WebSocket read failed");
                    return Ok(SessionEnd::Disconnected);
                }
                Some(Ok(Message::Text(text))) => {
                    let Some(event) = parse_confirmation(text.as_str()) else {
                        continue;
                    };
                    tokio::select! {
                        sent = events.send(event) => {
                            if sent.is_err() {
                                return Ok(SessionEnd::Stopped);
                            }
                        }
                        _ = cancel.cancelled() => return Ok(SessionEnd::Stopped),
                    }
                }
                _ => {}
            }
        }
    }
}

/// Decode one node frame; acks, keepalives and other topics yield `None`.
fn parse_confirmation(text: &str) -> Option<BlockEvent> {
    match serde_json::from_str::<NodeFrame>(text) {
        Ok(frame) => frame.into_block_event(),
        Err(e) => {
            debug!(error = %e, "unparseable node frame");
            None
        }
    }
}
