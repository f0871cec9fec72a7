//! `walletcast-hub`: the single owner of the live client registry.
//!
//! # Overview
//!
//! A [`Hub`] runs as one task that owns every [`Client`]. Producers (the
//! block relay, the price scheduler, connection handlers) talk to it only
//! through a cloneable [`HubHandle`], which turns each call into a
//! [`HubCommand`] on a bounded queue. Register, unregister, subscription
//! changes, snapshots and deliveries are therefore applied in one order and
//! never race each other.
//!
//! Deliveries never wait on a client: the Hub `try_send`s onto the client's
//! bounded outbound queue. A full queue drops the payload and counts a
//! strike; too many consecutive strikes, or a closed queue, removes the
//! client. Removing a client drops its queue sender, which is how the
//! per-connection writer learns it must close the socket.

pub mod client;
pub mod error;
pub mod hub;

pub use client::{Client, ClientSnapshot, Offer};
pub use error::{HubError, Result};
pub use hub::{Hub, HubCommand, HubHandle};
