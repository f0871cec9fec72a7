use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletcastError};
use crate::types::PriceMode;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024; // inbound client frames are tiny
pub const WRITE_TIMEOUT_MS: u64 = 10_000; // stalled socket threshold
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const RELAY_QUEUE_CAPACITY: usize = 100;
pub const HUB_COMMAND_CAPACITY: usize = 1024;
pub const CLIENT_QUEUE_CAPACITY: usize = 64;
pub const MAX_OVERFLOW_STRIKES: u32 = 3;
pub const MAX_ACCOUNTS_PER_CLIENT: usize = 100;
pub const PRICE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_PRICE_PROVIDER: &str = "coingecko";
pub const DEFAULT_PRICE_HASH: &str = "prices";
pub const DEFAULT_BPOW_URL: &str = "https://boompow.banano.cc/graphql";
/// Public donation address whose incoming sends are announced on the legacy channel.
pub const DONATION_ACCOUNT: &str =
    "nano_1natrium1o3z5519ifou7xii8crpxpk8y65qmkih8e8bpsjri651oza8imdd";

/// Top-level config (walletcast.toml + WALLETCAST_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletcastConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub work: WorkConfig,
    #[serde(default)]
    pub prices: PricesConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub donations: DonationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// A single socket write taking longer than this disconnects the client.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            write_timeout_ms: WRITE_TIMEOUT_MS,
            heartbeat_interval_secs: HEARTBEAT_INTERVAL_SECS,
        }
    }
}

/// Upstream node WebSocket (confirmation topic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub ws_url: Option<String>,
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

/// Work generation backend. Not used by the real-time layer itself, but the
/// server refuses to start without one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkConfig {
    pub url: Option<String>,
    pub bpow_key: Option<String>,
    #[serde(default = "default_bpow_url")]
    pub bpow_url: String,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            url: None,
            bpow_key: None,
            bpow_url: default_bpow_url(),
        }
    }
}

impl WorkConfig {
    pub fn is_configured(&self) -> bool {
        non_empty(&self.url) || non_empty(&self.bpow_key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Redis hash holding every `<provider>:<pair>` field.
    #[serde(default = "default_price_hash")]
    pub hash: String,
    #[serde(default = "default_price_provider")]
    pub provider: String,
    #[serde(default = "default_price_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub mode: PriceMode,
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            hash: default_price_hash(),
            provider: default_price_provider(),
            interval_secs: PRICE_INTERVAL_SECS,
            mode: PriceMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
    #[serde(default = "default_client_queue_capacity")]
    pub client_queue_capacity: usize,
    /// Consecutive full-queue drops tolerated before a client is disconnected.
    #[serde(default = "default_max_overflow_strikes")]
    pub max_overflow_strikes: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_capacity: HUB_COMMAND_CAPACITY,
            client_queue_capacity: CLIENT_QUEUE_CAPACITY,
            max_overflow_strikes: MAX_OVERFLOW_STRIKES,
        }
    }
}

/// Legacy donation listener channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_donation_account")]
    pub account: String,
}

impl Default for DonationsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            account: default_donation_account(),
        }
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_write_timeout_ms() -> u64 {
    WRITE_TIMEOUT_MS
}
fn default_heartbeat_secs() -> u64 {
    HEARTBEAT_INTERVAL_SECS
}
fn default_reconnect_initial_ms() -> u64 {
    500
}
fn default_reconnect_max_ms() -> u64 {
    60_000
}
fn default_bpow_url() -> String {
    DEFAULT_BPOW_URL.to_string()
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_price_hash() -> String {
    DEFAULT_PRICE_HASH.to_string()
}
fn default_price_provider() -> String {
    DEFAULT_PRICE_PROVIDER.to_string()
}
fn default_price_interval_secs() -> u64 {
    PRICE_INTERVAL_SECS
}
fn default_command_capacity() -> usize {
    HUB_COMMAND_CAPACITY
}
fn default_client_queue_capacity() -> usize {
    CLIENT_QUEUE_CAPACITY
}
fn default_max_overflow_strikes() -> u32 {
    MAX_OVERFLOW_STRIKES
}
fn default_donation_account() -> String {
    DONATION_ACCOUNT.to_string()
}

impl WalletcastConfig {
    /// Load config from a TOML file with WALLETCAST_* env var overrides.
    ///
    /// Nested keys use a double underscore: `WALLETCAST_NODE__WS_URL`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("WALLETCAST_").split("__"))
            .extract()
            .map_err(|e| WalletcastError::Config(e.to_string()))
    }

    /// Reject configurations the server cannot serve its purpose with.
    pub fn validate(&self) -> Result<()> {
        if !non_empty(&self.node.ws_url) {
            return Err(WalletcastError::Config(
                "node.ws_url must be set: no block event source configured".into(),
            ));
        }
        if !self.work.is_configured() {
            return Err(WalletcastError::Config(
                "either work.url or work.bpow_key must be set for work generation".into(),
            ));
        }
        if self.hub.client_queue_capacity == 0 || self.hub.command_capacity == 0 {
            return Err(WalletcastError::Config(
                "hub queue capacities must be greater than zero".into(),
            ));
        }
        if self.prices.interval_secs == 0 {
            return Err(WalletcastError::Config(
                "prices.interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.walletcast/walletcast.toml", home)
}
