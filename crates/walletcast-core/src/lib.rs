//! `walletcast-core`: configuration, shared error type and the domain types
//! every other walletcast crate speaks.

pub mod config;
pub mod error;
pub mod types;

pub use config::WalletcastConfig;
pub use error::{Result, WalletcastError};
pub use types::{Block, BlockEvent, ClientId, PriceMode};
