//! `walletcast-relay`: turns the node's confirmation feed into targeted
//! client deliveries.
//!
//! [`NodeWatcher`] owns the upstream WebSocket and pushes [`BlockEvent`]s
//! onto a bounded queue; [`BlockRelay`] drains that queue, keeps only sends,
//! and asks the Hub to deliver each one to the clients watching the
//! block's counterpart account. A [`DonationRelay`] can be attached to
//! announce sends to one fixed public address on a legacy channel.
//!
//! [`BlockEvent`]: walletcast_core::types::BlockEvent

pub mod donation;
pub mod error;
pub mod relay;
pub mod watcher;

pub use donation::{DonationRelay, NamespaceBroadcaster};
pub use error::{RelayError, Result};
pub use relay::{BlockRelay, RelayOutcome};
pub use watcher::NodeWatcher;
