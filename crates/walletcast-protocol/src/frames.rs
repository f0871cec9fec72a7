use serde::{Deserialize, Serialize};
use serde_json::Value;
use walletcast_core::types::{Block, BlockEvent};

/// Client → Server request, tagged by `action`.
/// Wire: `{ "action": "account_subscribe", "account": "nano_1...", "currency": "usd" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientRequest {
    AccountSubscribe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        accounts: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        currency: Option<String>,
    },
    AccountUnsubscribe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        accounts: Vec<String>,
    },
}

impl ClientRequest {
    /// Every account named by the request, single `account` first, blanks removed.
    pub fn accounts(&self) -> Vec<String> {
        let (single, many) = match self {
            ClientRequest::AccountSubscribe {
                account, accounts, ..
            }
            | ClientRequest::AccountUnsubscribe { account, accounts } => (account, accounts),
        };
        let mut out: Vec<String> = Vec::with_capacity(many.len() + 1);
        for acct in single.iter().chain(many.iter()) {
            let acct = acct.trim();
            if !acct.is_empty() && !out.iter().any(|a| a == acct) {
                out.push(acct.to_string());
            }
        }
        out
    }
}

/// Server → Client block notification.
/// Wire: `{ "account": ..., "block": {...}, "hash": ..., "is_send": "true", "amount": ... }`
///
/// `is_send` is a string on the wire; existing wallets compare it to `"true"`.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackMessage<'a> {
    pub account: &'a str,
    pub block: &'a Block,
    pub hash: &'a str,
    pub is_send: &'static str,
    pub amount: &'a str,
}

impl<'a> CallbackMessage<'a> {
    pub fn send(event: &'a BlockEvent) -> Self {
        Self {
            account: &event.account,
            block: &event.block,
            hash: &event.hash,
            is_send: "true",
            amount: &event.amount,
        }
    }
}

/// Server → Client periodic price push.
/// Wire: `{ "currency": "USD", "price": 1.02, "btc_price": 0.00002, "nano_price": 0.3 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMessage {
    pub currency: String,
    pub price: f64,
    pub btc_price: f64,
    /// Only present in the secondary (banano) price mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nano_price: Option<f64>,
}

/// Server → Client acknowledgement of an `account_subscribe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeAck {
    pub ack: String,
    pub currency: String,
    pub accounts: usize,
}

impl SubscribeAck {
    pub fn subscribed(currency: impl Into<String>, accounts: usize) -> Self {
        Self {
            ack: "subscribed".to_string(),
            currency: currency.into(),
            accounts,
        }
    }
}

/// Payload of the legacy `donation_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationEvent {
    pub amount: String,
}

/// Envelope sent to legacy namespace listeners.
/// Wire: `{ "namespace": "/", "event": "donation_event", "data": { "amount": "..." } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceEvent {
    pub namespace: String,
    pub event: String,
    pub data: Value,
}
