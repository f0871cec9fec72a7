use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Key not found: {0}")]
    Miss(String),

    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

/// Read side of the shared price store. Keys follow `<provider>:<pair>`,
/// e.g. `coingecko:nano-btc`.
#[async_trait]
pub trait PriceCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<String, CacheError>;
}

/// Prices stored as fields of one Redis hash (`HGET <hash> <key>`).
///
/// The connection is opened on first use and reopened after a backend error.
pub struct RedisPriceCache {
    client: redis::Client,
    hash: String,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisPriceCache {
    /// Parses the URL only; no connection is made until the first read.
    pub fn new(redis_url: &str, hash: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            hash: hash.into(),
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut guard = self.conn.lock().await;
        if let Some(ref conn) = *guard {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        debug!(hash = %self.hash, "price cache connected");
        *guard = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl PriceCache for RedisPriceCache {
    async fn get(&self, key: &str) -> Result<String, CacheError> {
        let mut conn = self.connection().await?;
        match conn.hget::<_, _, Option<String>>(&self.hash, key).await {
            Ok(value) => value.ok_or_else(|| CacheError::Miss(key.to_string())),
            Err(e) => {
                warn!(error = %e, "price cache read failed, dropping connection");
                *self.conn.lock().await = None;
                Err(e.into())
            }
        }
    }
}

/// In-process price table for tests and local runs without Redis.
#[derive(Default)]
pub struct MemoryPriceCache {
    prices: RwLock<HashMap<String, String>>,
}

impl MemoryPriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut prices) = self.prices.write() {
            prices.insert(key.into(), value.into());
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut prices) = self.prices.write() {
            prices.remove(key);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryPriceCache {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let prices = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            prices: RwLock::new(prices),
        }
    }
}

#[async_trait]
impl PriceCache for MemoryPriceCache {
    async fn get(&self, key: &str) -> Result<String, CacheError> {
        let prices = self
            .prices
            .read()
            .map_err(|_| CacheError::Backend("price table poisoned".into()))?;
        prices
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::Miss(key.to_string()))
    }
}
