//! carplay-bridge binary
//!
//! Wires the full pipeline: parameter-set cache restore, driver probe,
//! event pump, dongle start sequence, and the viewer WebSocket endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use carplay_bridge::config::BridgeConfig;
use carplay_bridge::dongle::{resolve_event_source, DongleDriver, MockDongle};
use carplay_bridge::media::{CachedParams, JsonFileStore, ParamSetCache, ParamSetExtractor, ParamSetStore};
use carplay_bridge::relay::{EventPump, StatusCell, StatusTracker, ViewerRegistry};
use carplay_bridge::server::BridgeServer;

/// CarPlay dongle to WebSocket bridge
#[derive(Debug, Parser)]
#[command(
    name = "carplay-bridge",
    about = "Relays a USB CarPlay dongle to browser viewers over WebSocket",
    version
)]
struct Cli {
    /// Socket address for the viewer WebSocket endpoint
    #[arg(long, default_value = "0.0.0.0:5006", env = "CARPLAY_BIND")]
    bind: SocketAddr,

    /// Durable SPS/PPS cache file
    #[arg(long, default_value = "parameter-sets.json", env = "CARPLAY_CACHE_FILE")]
    cache_file: String,

    /// Delay before each dongle start attempt, in milliseconds
    #[arg(long, default_value_t = 1000, env = "CARPLAY_SETTLE_MS")]
    settle_ms: u64,

    /// Delay between failed dongle start attempts, in milliseconds
    #[arg(long, default_value_t = 5000, env = "CARPLAY_RETRY_MS")]
    retry_ms: u64,

    /// Attach a mock dongle instead of real hardware
    #[arg(long, env = "CARPLAY_MOCK_DONGLE")]
    mock_dongle: bool,
}

impl Cli {
    fn into_config(self) -> BridgeConfig {
        BridgeConfig::default()
            .bind(self.bind)
            .settle_delay(Duration::from_millis(self.settle_ms))
            .retry_delay(Duration::from_millis(self.retry_ms))
            .cache_path(self.cache_file)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mock_dongle = cli.mock_dongle;
    let config = cli.into_config();

    tracing::info!(
        addr = %config.bind_addr,
        cache = %config.cache_path.display(),
        "carplay-bridge starting"
    );

    // Restore the parameter-set cache from the previous run
    let store = Arc::new(JsonFileStore::new(&config.cache_path));
    let initial = match store.load().await {
        Ok(Some(persisted)) => {
            let params = persisted.decode();
            tracing::info!(
                sps = params.sps.is_some(),
                pps = params.pps.is_some(),
                "Restored parameter sets from disk"
            );
            params
        }
        Ok(None) => CachedParams::default(),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable parameter-set cache");
            CachedParams::default()
        }
    };
    let cache = Arc::new(ParamSetCache::with_initial(initial));

    let mut driver: Option<Arc<dyn DongleDriver>> = if mock_dongle {
        tracing::info!("Using mock dongle");
        Some(Arc::new(
            MockDongle::with_settings(config.dongle.clone()).feed_capacity(config.event_capacity),
        ))
    } else {
        None
    };

    // A driver with no usable event feed is worse than no driver: detach it
    // so touch input degrades to a no-op alongside the missing media
    let probe = driver.as_ref().map(|d| resolve_event_source(d.as_ref()));
    let events = match probe {
        Some(Ok(rx)) => Some(rx),
        Some(Err(e)) => {
            tracing::error!(error = %e, "Driver exposes no usable event feed, detaching it");
            driver = None;
            None
        }
        None => {
            tracing::warn!("No dongle attached, viewers depend on a simulator");
            None
        }
    };

    let cell = Arc::new(StatusCell::new());
    let registry = Arc::new(ViewerRegistry::new(
        Arc::clone(&cell),
        Arc::clone(&cache),
        driver.clone(),
    ));
    let tracker = Arc::new(StatusTracker::new(cell, Arc::clone(&registry)));

    if let Some(events) = events {
        let extractor = ParamSetExtractor::new(Arc::clone(&cache), store);
        let pump = EventPump::new(Arc::clone(&registry), Arc::clone(&tracker), extractor);
        tokio::spawn(pump.run(events));
    }

    if let Some(driver) = driver {
        let tracker = Arc::clone(&tracker);
        let settle = config.settle_delay;
        let retry = config.retry_delay;
        tokio::spawn(async move {
            tracker.run_start_sequence(driver, settle, retry).await;
        });
    }

    let server = BridgeServer::new(config, registry);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("carplay-bridge stopped");
    Ok(())
}
