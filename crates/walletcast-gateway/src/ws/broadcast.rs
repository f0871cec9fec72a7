use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;
use walletcast_protocol::frames::NamespaceEvent;
use walletcast_relay::NamespaceBroadcaster;

const BROADCAST_CAPACITY: usize = 256;

/// Fan-out for the legacy donation listeners via tokio broadcast channel.
///
/// A lagging listener loses the oldest events; it never slows the sender.
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// New listener subscribes to the broadcast stream.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceBroadcaster for EventBroadcaster {
    /// Silently drops if no listeners exist.
    fn broadcast_to_namespace(&self, namespace: &str, event: &str, payload: Value) {
        let frame = NamespaceEvent {
            namespace: namespace.to_string(),
            event: event.to_string(),
            data: payload,
        };
        match serde_json::to_string(&frame) {
            Ok(json) => {
                let _ = self.tx.send(json);
            }
            Err(e) => warn!(%event, error = %e, "failed to serialize namespace event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_listener_gets_the_envelope() {
        let broadcaster = EventBroadcaster::new();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();
        assert_eq!(broadcaster.listeners(), 2);

        broadcaster.broadcast_to_namespace(
            "/",
            "donation_event",
            serde_json::json!({ "amount": "3" }),
        );

        for rx in [&mut a, &mut b] {
            let frame: NamespaceEvent = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(frame.event, "donation_event");
            assert_eq!(frame.data["amount"], "3");
        }
    }

    #[test]
    fn broadcasting_without_listeners_is_harmless() {
        let broadcaster = EventBroadcaster::new();
        broadcaster.broadcast_to_namespace("/", "donation_event", Value::Null);
        assert_eq!(broadcaster.listeners(), 0);
    }
}
