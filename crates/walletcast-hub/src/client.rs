use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use walletcast_core::config::{DEFAULT_CURRENCY, MAX_ACCOUNTS_PER_CLIENT};
use walletcast_core::types::ClientId;

/// One live connection's subscription state, owned by the Hub.
///
/// The outbound sender is the only way payloads reach the connection's
/// writer. Dropping the `Client` drops the sender and closes the queue.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    accounts: HashSet<String>,
    currency: String,
    outbound: mpsc::Sender<String>,
    connected_at: DateTime<Utc>,
    strikes: u32,
}

/// Result of offering a payload to a client's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// Queue full; payload discarded. Carries the consecutive drop count.
    Dropped { strikes: u32 },
    /// Writer is gone.
    Closed,
}

/// Outcome of a `watch` call.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Watched {
    pub added: Vec<String>,
    /// New accounts turned away because the client was at the cap.
    pub over_cap: usize,
}

/// Immutable copy of a client's state, safe to hand out of the Hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    pub id: ClientId,
    pub currency: String,
    pub accounts: Vec<String>,
    pub connected_at: DateTime<Utc>,
}

impl Client {
    pub fn new(id: ClientId, outbound: mpsc::Sender<String>) -> Self {
        Self {
            id,
            accounts: HashSet::new(),
            currency: DEFAULT_CURRENCY.to_string(),
            outbound,
            connected_at: Utc::now(),
            strikes: 0,
        }
    }

    /// Build a client together with the receiving end of its outbound queue.
    pub fn channel(id: ClientId, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.accounts.iter().map(String::as_str)
    }

    pub fn snapshot(&self) -> ClientSnapshot {
        let mut accounts: Vec<String> = self.accounts.iter().cloned().collect();
        accounts.sort();
        ClientSnapshot {
            id: self.id,
            currency: self.currency.clone(),
            accounts,
            connected_at: self.connected_at,
        }
    }

    /// Non-blocking enqueue. Never waits on the writer.
    pub(crate) fn offer(&mut self, payload: String) -> Offer {
        match self.outbound.try_send(payload) {
            Ok(()) => {
                self.strikes = 0;
                Offer::Queued
            }
            Err(TrySendError::Full(_)) => {
                self.strikes += 1;
                Offer::Dropped {
                    strikes: self.strikes,
                }
            }
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    /// Add accounts up to the per-client cap. Already-watched accounts are
    /// neither added nor counted as over the cap.
    pub(crate) fn watch(&mut self, accounts: Vec<String>) -> Watched {
        let mut watched = Watched::default();
        for account in accounts {
            if self.accounts.contains(&account) {
                continue;
            }
            if self.accounts.len() >= MAX_ACCOUNTS_PER_CLIENT {
                watched.over_cap += 1;
                continue;
            }
            self.accounts.insert(account.clone());
            watched.added.push(account);
        }
        watched
    }

    /// Returns the accounts that were actually being watched.
    pub(crate) fn unwatch(&mut self, accounts: Vec<String>) -> Vec<String> {
        accounts
            .into_iter()
            .filter(|a| self.accounts.remove(a))
            .collect()
    }

    pub(crate) fn set_currency(&mut self, currency: &str) {
        let currency = currency.trim();
        if !currency.is_empty() {
            self.currency = currency.to_uppercase();
        }
    }

    pub(crate) fn watched_count(&self) -> usize {
        self.accounts.len()
    }
}
