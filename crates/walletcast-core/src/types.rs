use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Per-connection identifier (random UUID, not persisted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block body as reported by the node's confirmation topic.
///
/// Every field defaults to empty so legacy (non-state) blocks still parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Block {
    #[serde(rename = "type")]
    pub block_type: String,
    pub account: String,
    pub previous: String,
    pub representative: String,
    pub balance: String,
    pub link: String,
    pub link_as_account: String,
    pub signature: String,
    pub work: String,
    pub subtype: String,
}

/// One confirmed block pushed by the upstream node watcher.
///
/// Consumed once by the relay, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockEvent {
    pub account: String,
    pub amount: String,
    pub hash: String,
    pub block: Block,
}

impl BlockEvent {
    pub fn subtype(&self) -> &str {
        &self.block.subtype
    }

    /// Counterpart account referenced by the block; the relay matches on it.
    pub fn link_as_account(&self) -> &str {
        &self.block.link_as_account
    }

    pub fn is_send(&self) -> bool {
        self.subtype() == "send"
    }
}

/// Which base asset prices are quoted in.
///
/// `Banano` is the secondary mode: every price message also carries the
/// banano→nano rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    #[default]
    Nano,
    Banano,
}

impl PriceMode {
    /// Asset segment used in price cache keys.
    pub fn asset(&self) -> &'static str {
        match self {
            PriceMode::Nano => "nano",
            PriceMode::Banano => "banano",
        }
    }

    pub fn is_secondary(&self) -> bool {
        matches!(self, PriceMode::Banano)
    }
}

impl fmt::Display for PriceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.asset())
    }
}

impl std::str::FromStr for PriceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "nano" => Ok(PriceMode::Nano),
            "banano" => Ok(PriceMode::Banano),
            other => Err(format!("unknown price mode: {}", other)),
        }
    }
}
