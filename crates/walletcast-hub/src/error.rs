use thiserror::Error;

/// Errors surfaced by [`crate::HubHandle`].
#[derive(Debug, Error)]
pub enum HubError {
    /// The hub task has stopped; no further commands are accepted.
    #[error("Hub is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, HubError>;
