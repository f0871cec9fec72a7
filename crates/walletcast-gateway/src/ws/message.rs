use tracing::{debug, warn};
use walletcast_core::types::ClientId;
use walletcast_hub::{HubError, HubHandle};
use walletcast_protocol::frames::ClientRequest;

/// Process one inbound WS text frame.
///
/// Malformed frames are logged and ignored. Only a stopped Hub is an error,
/// and it ends the connection.
pub async fn handle(client_id: ClientId, text: &str, hub: &HubHandle) -> Result<(), HubError> {
    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "malformed frame");
            return Ok(());
        }
    };

    let accounts = request.accounts();
    match request {
        ClientRequest::AccountSubscribe { currency, .. } => {
            debug!(%client_id, accounts = accounts.len(), "account_subscribe");
            hub.subscribe(client_id, accounts, currency).await
        }
        ClientRequest::AccountUnsubscribe { .. } => {
            debug!(%client_id, accounts = accounts.len(), "account_unsubscribe");
            hub.unsubscribe(client_id, accounts).await
        }
    }
}
