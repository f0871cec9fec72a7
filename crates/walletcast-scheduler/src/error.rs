use thiserror::Error;
use walletcast_hub::HubError;

use crate::cache::CacheError;

/// Errors that can occur within the price scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Price cache read failed.
    #[error("Price cache error: {0}")]
    Cache(#[from] CacheError),

    /// Cached value is not a number.
    #[error("Unparseable price at {key}: {value:?}")]
    Parse { key: String, value: String },

    /// The Hub stopped accepting commands.
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
