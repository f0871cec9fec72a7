use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use walletcast_core::types::BlockEvent;
use walletcast_protocol::frames::DonationEvent;

pub const DONATION_NAMESPACE: &str = "/";
pub const DONATION_EVENT: &str = "donation_event";

/// Secondary real-time transport: pushes one named event to every listener
/// of a namespace, with no per-listener filtering.
pub trait NamespaceBroadcaster: Send + Sync {
    fn broadcast_to_namespace(&self, namespace: &str, event: &str, payload: Value);
}

/// Announces incoming sends to one fixed public account.
#[derive(Clone)]
pub struct DonationRelay {
    account: String,
    sink: Arc<dyn NamespaceBroadcaster>,
}

impl DonationRelay {
    pub fn new(account: impl Into<String>, sink: Arc<dyn NamespaceBroadcaster>) -> Self {
        Self {
            account: account.into(),
            sink,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Broadcast `event` if it is a non-empty send to the donation account.
    /// Returns whether anything was broadcast.
    pub fn observe(&self, event: &BlockEvent) -> bool {
        if !event.is_send() || event.link_as_account() != self.account || event.amount.is_empty() {
            return false;
        }
        let payload = match serde_json::to_value(DonationEvent {
            amount: event.amount.clone(),
        }) {
            Ok(v) => v,
            Err(e) => {
                warn!(hash = %event.hash, error = %e, "failed to serialize donation event");
                return false;
            }
        };
        self.sink
            .broadcast_to_namespace(DONATION_NAMESPACE, DONATION_EVENT, payload);
        info!(hash = %event.hash, amount = %event.amount, "donation announced");
        true
    }
}
