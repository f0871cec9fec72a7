use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walletcast_core::types::BlockEvent;
use walletcast_hub::HubHandle;
use walletcast_protocol::frames::CallbackMessage;

use crate::donation::DonationRelay;
use crate::error::Result;

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Not a send; discarded without side effects.
    Filtered,
    /// Handed to the Hub for every client watching the counterpart account.
    Delivered,
    /// Could not be serialized; dropped.
    Dropped,
}

/// Consumer of the node event queue. Holds no state between events.
pub struct BlockRelay {
    hub: HubHandle,
    donations: Option<DonationRelay>,
}

impl BlockRelay {
    pub fn new(hub: HubHandle) -> Self {
        Self {
            hub,
            donations: None,
        }
    }

    pub fn with_donations(mut self, donations: DonationRelay) -> Self {
        self.donations = Some(donations);
        self
    }

    /// Drain `events` until the queue closes, the Hub stops, or `cancel` fires.
    pub async fn run(self, mut events: mpsc::Receiver<BlockEvent>, cancel: CancellationToken) {
        info!("block relay started");
        loop {
            let event = tokio::select! {
                ev = events.recv() => ev,
                _ = cancel.cancelled() => {
                    info!("block relay shutting down");
                    break;
                }
            };
            let Some(event) = event else {
                info!("block event queue closed, relay stopping");
                break;
            };
            if let Err(e) = self.process(&event).await {
                warn!(error = %e, "block relay stopping");
                break;
            }
        }
    }

    /// Filter, match and deliver a single event.
    ///
    /// Only a stopped Hub is reported as an error; everything else is
    /// logged and folded into the outcome.
    pub async fn process(&self, event: &BlockEvent) -> Result<RelayOutcome> {
        if !event.is_send() {
            return Ok(RelayOutcome::Filtered);
        }

        if let Some(ref donations) = self.donations {
            donations.observe(event);
        }

        let payload = match serde_json::to_string(&CallbackMessage::send(event)) {
            Ok(p) => p,
            Err(e) => {
                error!(hash = %event.hash, error = %e, "failed to serialize callback message");
                return Ok(RelayOutcome::Dropped);
            }
        };

        debug!(hash = %event.hash, account = %event.link_as_account(), "relaying send");
        self.hub
            .broadcast_to_account(event.link_as_account().to_string(), payload)
            .await?;
        Ok(RelayOutcome::Delivered)
    }
}
