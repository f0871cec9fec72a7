use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walletcast_core::config::PricesConfig;
use walletcast_core::types::PriceMode;
use walletcast_hub::HubHandle;
use walletcast_protocol::frames::PriceMessage;

use crate::cache::PriceCache;
use crate::error::{Result, SchedulerError};

/// Counts for one broadcast cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub delivered: usize,
    pub skipped: usize,
    /// Base price unavailable; nothing was sent.
    pub aborted: bool,
}

impl CycleReport {
    fn aborted() -> Self {
        Self {
            aborted: true,
            ..Self::default()
        }
    }
}

/// Periodic price push. Reads the cache, never writes it.
pub struct PriceScheduler {
    hub: HubHandle,
    cache: Arc<dyn PriceCache>,
    mode: PriceMode,
    provider: String,
    interval: Duration,
}

impl PriceScheduler {
    pub fn new(hub: HubHandle, cache: Arc<dyn PriceCache>, config: &PricesConfig) -> Self {
        Self {
            hub,
            cache,
            mode: config.mode,
            provider: config.provider.clone(),
            interval: Duration::from_secs(config.interval_secs.max(1)),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// `<provider>:<asset>-<quote>`, quote lowercased.
    pub fn price_key(&self, quote: &str) -> String {
        format!(
            "{}:{}-{}",
            self.provider,
            self.mode.asset(),
            quote.to_lowercase()
        )
    }

    /// Main loop. First cycle fires one interval after start; missed ticks
    /// are skipped rather than bunched. Stops on cancel or when the Hub does.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            mode = %self.mode,
            interval_secs = self.interval.as_secs(),
            "price scheduler started"
        );
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(report) => debug!(
                            delivered = report.delivered,
                            skipped = report.skipped,
                            aborted = report.aborted,
                            "price cycle complete"
                        ),
                        Err(e) => {
                            warn!(error = %e, "price scheduler stopping");
                            break;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("price scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// One broadcast cycle.
    ///
    /// Cache and serialization failures are logged and scoped (whole cycle
    /// for the base prices, one currency otherwise); only a stopped Hub is
    /// returned as an error.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let btc_key = self.price_key("btc");
        let btc_price = match self.read_price(&btc_key).await {
            Ok(p) => p,
            Err(e) => {
                error!(key = %btc_key, error = %e, "base price unavailable, skipping price cycle");
                return Ok(CycleReport::aborted());
            }
        };

        let nano_price = if self.mode.is_secondary() {
            let nano_key = self.price_key("nano");
            match self.read_price(&nano_key).await {
                Ok(p) => Some(p),
                Err(e) => {
                    error!(key = %nano_key, error = %e, "nano price unavailable, skipping price cycle");
                    return Ok(CycleReport::aborted());
                }
            }
        } else {
            None
        };

        let clients = self.hub.snapshot().await?;
        let mut report = CycleReport::default();
        // currency -> serialized message, or None if that currency failed
        let mut rendered: HashMap<String, Option<String>> = HashMap::new();

        for client in clients {
            let payload = match rendered.get(&client.currency) {
                Some(cached) => cached.clone(),
                None => {
                    let fresh = self.render(&client.currency, btc_price, nano_price).await;
                    rendered.insert(client.currency.clone(), fresh.clone());
                    fresh
                }
            };
            match payload {
                Some(payload) => {
                    self.hub.broadcast_to_client(client.id, payload).await?;
                    report.delivered += 1;
                }
                None => report.skipped += 1,
            }
        }
        Ok(report)
    }

    async fn render(
        &self,
        currency: &str,
        btc_price: f64,
        nano_price: Option<f64>,
    ) -> Option<String> {
        let key = self.price_key(currency);
        let price = match self.read_price(&key).await {
            Ok(p) => p,
            Err(e) => {
                error!(%currency, key = %key, error = %e, "currency price unavailable");
                return None;
            }
        };
        let message = PriceMessage {
            currency: currency.to_string(),
            price,
            btc_price,
            nano_price,
        };
        match serde_json::to_string(&message) {
            Ok(json) => Some(json),
            Err(e) => {
                error!(%currency, error = %e, "failed to serialize price message");
                None
            }
        }
    }

    async fn read_price(&self, key: &str) -> Result<f64> {
        let raw = self.cache.get(key).await?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
            .ok_or(SchedulerError::Parse {
                key: key.to_string(),
                value: raw,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryPriceCache};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use walletcast_core::config::HubConfig;
    use walletcast_core::types::ClientId;
    use walletcast_hub::Hub;

    /// Counts reads so tests can see per-cycle caching.
    struct Counting {
        inner: MemoryPriceCache,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl PriceCache for Counting {
        async fn get(&self, key: &str) -> std::result::Result<String, CacheError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }
    }

    fn start_hub() -> (HubHandle, CancellationToken) {
        let (hub, handle) = Hub::new(&HubConfig::default());
        let cancel = CancellationToken::new();
        tokio::spawn(hub.run(cancel.clone()));
        (handle, cancel)
    }

    async fn client(hub: &HubHandle, currency: &str) -> (ClientId, mpsc::Receiver<String>) {
        let id = ClientId::new();
        let mut rx = hub.connect(id).await.unwrap();
        hub.subscribe(id, Vec::new(), Some(currency.to_string()))
            .await
            .unwrap();
        rx.recv().await.unwrap(); // ack
        (id, rx)
    }

    fn scheduler(hub: &HubHandle, cache: Arc<dyn PriceCache>, mode: PriceMode) -> PriceScheduler {
        let config = PricesConfig {
            mode,
            ..PricesConfig::default()
        };
        PriceScheduler::new(hub.clone(), cache, &config)
    }

    fn parse(raw: &str) -> PriceMessage {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn price_keys_follow_provider_asset_quote() {
        let (hub, _cancel) = start_hub();
        let cache = Arc::new(MemoryPriceCache::new());
        assert_eq!(
            scheduler(&hub, cache.clone(), PriceMode::Nano).price_key("USD"),
            "coingecko:nano-usd"
        );
        assert_eq!(
            scheduler(&hub, cache, PriceMode::Banano).price_key("btc"),
            "coingecko:banano-btc"
        );
    }

    #[tokio::test]
    async fn failed_currency_skips_only_that_client() {
        let (hub, _cancel) = start_hub();
        let (_, mut c1) = client(&hub, "USD").await;
        let (_, mut c2) = client(&hub, "EUR").await;
        let cache: MemoryPriceCache = [
            ("coingecko:nano-btc", "50000.5"),
            ("coingecko:nano-usd", "1.02"),
        ]
        .into_iter()
        .collect();

        let report = scheduler(&hub, Arc::new(cache), PriceMode::Nano)
            .run_cycle()
            .await
            .unwrap();
        assert_eq!(
            report,
            CycleReport {
                delivered: 1,
                skipped: 1,
                aborted: false
            }
        );
        hub.client_count().await.unwrap();

        let msg = parse(&c1.try_recv().unwrap());
        assert_eq!(msg.currency, "USD");
        assert_eq!(msg.price, 1.02);
        assert_eq!(msg.btc_price, 50000.5);
        assert_eq!(msg.nano_price, None);
        assert!(c1.try_recv().is_err());
        assert!(c2.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_base_price_aborts_cycle() {
        let (hub, _cancel) = start_hub();
        let (_, mut c1) = client(&hub, "USD").await;
        let cache: MemoryPriceCache = [("coingecko:nano-usd", "1.02")].into_iter().collect();

        let report = scheduler(&hub, Arc::new(cache), PriceMode::Nano)
            .run_cycle()
            .await
            .unwrap();
        assert!(report.aborted);
        assert_eq!(report.delivered, 0);
        hub.client_count().await.unwrap();
        assert!(c1.try_recv().is_err());
    }

    #[tokio::test]
    async fn unparseable_prices_are_scoped() {
        let (hub, _cancel) = start_hub();
        let (_, mut c1) = client(&hub, "USD").await;
        let cache = Arc::new(MemoryPriceCache::new());
        cache.set("coingecko:nano-btc", "not-a-number");
        cache.set("coingecko:nano-usd", "1.02");

        let sched = scheduler(&hub, cache.clone(), PriceMode::Nano);
        assert!(sched.run_cycle().await.unwrap().aborted);

        cache.set("coingecko:nano-btc", "0.00002");
        cache.set("coingecko:nano-usd", "NaN");
        let report = sched.run_cycle().await.unwrap();
        assert_eq!(report.skipped, 1);
        hub.client_count().await.unwrap();
        assert!(c1.try_recv().is_err());
    }

    #[tokio::test]
    async fn secondary_mode_adds_nano_price() {
        let (hub, _cancel) = start_hub();
        let (_, mut c1) = client(&hub, "usd").await;
        let cache: MemoryPriceCache = [
            ("coingecko:banano-btc", "0.0000001"),
            ("coingecko:banano-nano", "0.005"),
            ("coingecko:banano-usd", "0.004"),
        ]
        .into_iter()
        .collect();

        let report = scheduler(&hub, Arc::new(cache), PriceMode::Banano)
            .run_cycle()
            .await
            .unwrap();
        assert_eq!(report.delivered, 1);
        hub.client_count().await.unwrap();

        let msg = parse(&c1.try_recv().unwrap());
        assert_eq!(msg.nano_price, Some(0.005));
        assert_eq!(msg.price, 0.004);
    }

    #[tokio::test]
    async fn secondary_mode_aborts_without_nano_price() {
        let (hub, _cancel) = start_hub();
        let (_, mut c1) = client(&hub, "USD").await;
        let cache: MemoryPriceCache = [
            ("coingecko:banano-btc", "0.0000001"),
            ("coingecko:banano-nano", "garbage"),
            ("coingecko:banano-usd", "0.004"),
        ]
        .into_iter()
        .collect();

        let report = scheduler(&hub, Arc::new(cache), PriceMode::Banano)
            .run_cycle()
            .await
            .unwrap();
        assert!(report.aborted);
        hub.client_count().await.unwrap();
        assert!(c1.try_recv().is_err());
    }

    #[tokio::test]
    async fn shared_currency_is_read_once_per_cycle() {
        let (hub, _cancel) = start_hub();
        let (_, mut a) = client(&hub, "USD").await;
        let (_, mut b) = client(&hub, "USD").await;
        let cache = Arc::new(Counting {
            inner: [
                ("coingecko:nano-btc", "0.00002"),
                ("coingecko:nano-usd", "1.5"),
            ]
            .into_iter()
            .collect(),
            reads: AtomicUsize::new(0),
        });

        let report = scheduler(&hub, cache.clone(), PriceMode::Nano)
            .run_cycle()
            .await
            .unwrap();
        assert_eq!(report.delivered, 2);
        // base + one currency
        assert_eq!(cache.reads.load(Ordering::SeqCst), 2);

        hub.client_count().await.unwrap();
        assert_eq!(a.try_recv().unwrap(), b.try_recv().unwrap());
    }

    #[tokio::test]
    async fn disconnected_client_is_not_targeted() {
        let (hub, _cancel) = start_hub();
        let (gone, _gone_rx) = client(&hub, "USD").await;
        let (_, mut stays) = client(&hub, "USD").await;
        let cache: MemoryPriceCache = [
            ("coingecko:nano-btc", "0.00002"),
            ("coingecko:nano-usd", "1.5"),
        ]
        .into_iter()
        .collect();

        hub.unregister(gone).await.unwrap();
        assert_eq!(hub.client_count().await.unwrap(), 1);

        let report = scheduler(&hub, Arc::new(cache), PriceMode::Nano)
            .run_cycle()
            .await
            .unwrap();
        assert_eq!(report.delivered, 1);
        hub.client_count().await.unwrap();
        assert!(stays.try_recv().is_ok());
    }

    #[tokio::test]
    async fn run_ticks_and_stops_on_cancel() {
        let (hub, _hub_cancel) = start_hub();
        let (_, mut c1) = client(&hub, "USD").await;
        let cache: MemoryPriceCache = [
            ("coingecko:nano-btc", "0.00002"),
            ("coingecko:nano-usd", "1.5"),
        ]
        .into_iter()
        .collect();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            scheduler(&hub, Arc::new(cache), PriceMode::Nano)
                .with_interval(Duration::from_millis(20))
                .run(cancel.clone()),
        );

        let first = time::timeout(Duration::from_secs(2), c1.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parse(&first).price, 1.5);

        cancel.cancel();
        time::timeout(Duration::from_secs(1), task)
            .await
            .expect("scheduler must stop on cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn zero_interval_is_clamped_instead_of_panicking() {
        let (hub, _hub_cancel) = start_hub();
        let (_, mut c1) = client(&hub, "USD").await;
        let cache: MemoryPriceCache = [
            ("coingecko:nano-btc", "0.00002"),
            ("coingecko:nano-usd", "1.5"),
        ]
        .into_iter()
        .collect();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            scheduler(&hub, Arc::new(cache), PriceMode::Nano)
                .with_interval(Duration::ZERO)
                .run(cancel.clone()),
        );

        let first = time::timeout(Duration::from_secs(2), c1.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parse(&first).price, 1.5);

        cancel.cancel();
        time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .expect("run must not panic on a zero interval");
    }
}
