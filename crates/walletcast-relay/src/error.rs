use thiserror::Error;
use walletcast_hub::HubError;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The node WebSocket could not be reached or dropped mid-stream.
    #[error("Node connection failed: {0}")]
    Connect(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The Hub stopped accepting commands.
    #[error("Hub closed")]
    Closed,
}

impl From<HubError> for RelayError {
    fn from(_: HubError) -> Self {
        RelayError::Closed
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
