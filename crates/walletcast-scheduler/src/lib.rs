//! `walletcast-scheduler`: periodic price push to every connected client.
//!
//! # Overview
//!
//! Every `prices.interval_secs` the [`PriceScheduler`] reads the base asset's
//! BTC price from a [`PriceCache`], takes a snapshot of the Hub's clients and
//! sends each one a price message in its own display currency.
//!
//! # Failure scope
//!
//! | Failure                              | Effect                          |
//! |--------------------------------------|---------------------------------|
//! | base BTC price missing / unparseable | whole cycle skipped             |
//! | banano→nano price (secondary mode)   | whole cycle skipped             |
//! | one currency missing / unparseable   | clients in that currency skipped |
//! | Hub stopped                          | scheduler stops                 |

pub mod cache;
pub mod engine;
pub mod error;

pub use cache::{CacheError, MemoryPriceCache, PriceCache, RedisPriceCache};
pub use engine::{CycleReport, PriceScheduler};
pub use error::{Result, SchedulerError};
