use serde::{Deserialize, Serialize};
use serde_json::Value;
use walletcast_core::types::BlockEvent;

pub const CONFIRMATION_TOPIC: &str = "confirmation";

/// Server → Node topic subscription.
/// Wire: `{ "action": "subscribe", "topic": "confirmation", "ack": true }`
#[derive(Debug, Clone, Serialize)]
pub struct NodeSubscribe {
    pub action: &'static str,
    pub topic: &'static str,
    pub ack: bool,
}

impl NodeSubscribe {
    pub fn confirmations() -> Self {
        Self {
            action: "subscribe",
            topic: CONFIRMATION_TOPIC,
            ack: true,
        }
    }
}

/// Any frame the node pushes: topic messages, subscription acks, keepalives.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeFrame {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub ack: Option<String>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl NodeFrame {
    /// Extract the confirmed block, if this is a well-formed confirmation.
    pub fn into_block_event(self) -> Option<BlockEvent> {
        if self.topic.as_deref() != Some(CONFIRMATION_TOPIC) {
            return None;
        }
        serde_json::from_value(self.message?).ok()
    }
}
