use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use walletcast_core::config::{PricesConfig, WalletcastConfig, RELAY_QUEUE_CAPACITY};
use walletcast_core::types::{BlockEvent, PriceMode};
use walletcast_hub::Hub;
use walletcast_relay::{BlockRelay, DonationRelay, NodeWatcher};
use walletcast_scheduler::{MemoryPriceCache, PriceCache, PriceScheduler, RedisPriceCache};

mod app;
mod http;
mod ws;

#[derive(Debug, Parser)]
#[command(name = "walletcast-gateway", version, about = "Real-time wallet push server")]
struct Cli {
    /// Config file (defaults to ~/.walletcast/walletcast.toml)
    #[arg(long, env = "WALLETCAST_CONFIG")]
    config: Option<String>,

    /// Quote prices for banano instead of nano
    #[arg(long)]
    banano: bool,

    /// Serve the legacy donation listener socket at /donations
    #[arg(long)]
    donations: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "walletcast_gateway=info,walletcast_hub=info,walletcast_relay=info,\
                 walletcast_scheduler=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // explicit path > WALLETCAST_CONFIG env > ~/.walletcast/walletcast.toml
    let mut config = WalletcastConfig::load(cli.config.as_deref())?;
    if cli.banano {
        config.prices.mode = PriceMode::Banano;
    }
    if cli.donations {
        config.donations.enabled = true;
    }
    if let Err(e) = config.validate() {
        error!(error = %e, "refusing to start");
        return Err(e.into());
    }
    match (&config.work.url, &config.work.bpow_key) {
        (Some(url), _) if !url.trim().is_empty() => info!(%url, "work generation via work peer"),
        _ => info!(url = %config.work.bpow_url, "work generation via BoomPoW"),
    }

    let shutdown = CancellationToken::new();

    // hub: single owner of the client registry
    let (hub, hub_handle) = Hub::new(&config.hub);
    let hub_task = tokio::spawn(hub.run(shutdown.clone()));

    let donations = Arc::new(ws::broadcast::EventBroadcaster::new());

    // block events: NodeWatcher → bounded queue → BlockRelay → Hub
    let (events_tx, events_rx) = tokio::sync::mpsc::channel::<BlockEvent>(RELAY_QUEUE_CAPACITY);
    let watcher = NodeWatcher::new(&config.node)?;
    tokio::spawn(watcher.run(events_tx, shutdown.clone()));

    let mut relay = BlockRelay::new(hub_handle.clone());
    if config.donations.enabled {
        let donation = DonationRelay::new(config.donations.account.clone(), donations.clone());
        info!(account = %donation.account(), "donation announcements enabled");
        relay = relay.with_donations(donation);
    }
    tokio::spawn(relay.run(events_rx, shutdown.clone()));

    let cache = build_price_cache(&config.prices)?;
    let scheduler = PriceScheduler::new(hub_handle.clone(), cache, &config.prices);
    tokio::spawn(scheduler.run(shutdown.clone()));
    info!(
        mode = %config.prices.mode,
        every_secs = config.prices.interval_secs,
        "price broadcasts scheduled"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = Arc::new(app::AppState::new(
        config,
        hub_handle,
        donations,
        shutdown.clone(),
    ));
    let router = app::build_router(state);

    let token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C, shutting down"),
        }
        token.cancel();
    });

    info!("Walletcast gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let token = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    // in case the server exited on its own
    shutdown.cancel();
    let _ = hub_task.await;
    info!("shutdown complete");
    Ok(())
}

/// An empty `prices.redis_url` selects the in-process cache, which starts
/// empty: every cycle aborts until something fills it.
fn build_price_cache(config: &PricesConfig) -> anyhow::Result<Arc<dyn PriceCache>> {
    if config.redis_url.trim().is_empty() {
        warn!("prices.redis_url is empty, using an in-memory price cache");
        return Ok(Arc::new(MemoryPriceCache::new()));
    }
    let cache = RedisPriceCache::new(&config.redis_url, config.hash.clone())?;
    info!(hash = %config.hash, "reading prices from Redis");
    Ok(Arc::new(cache))
}
