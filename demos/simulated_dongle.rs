//! Bridge demo backed by the loopback mock dongle
//!
//! Run with: cargo run --example simulated_dongle [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simulated_dongle                  # binds to 127.0.0.1:5006
//!   cargo run --example simulated_dongle 0.0.0.0:5010     # binds to 0.0.0.0:5010
//!
//! The mock dongle loops a synthetic H.264-flavored pattern: one keyframe
//! group (SPS + PPS + IDR) per second with delta frames in between. Point
//! a viewer at the bind address to watch status and frames arrive; the
//! parameter sets land in a cache file under the system temp directory,
//! so a viewer connecting after a restart is primed from disk.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use carplay_bridge::config::BridgeConfig;
use carplay_bridge::dongle::{resolve_event_source, DongleDriver, DriverMessage, MockDongle};
use carplay_bridge::media::{JsonFileStore, ParamSetCache, ParamSetExtractor};
use carplay_bridge::relay::{EventPump, StatusCell, StatusTracker, ViewerRegistry};
use carplay_bridge::server::BridgeServer;

/// SPS + PPS + IDR slice, Annex-B framed
const KEYFRAME_GROUP: &[u8] = &[
    0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0xC0, 0x1F, 0x8C, 0x8D, 0x40, // SPS
    0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80, // PPS
    0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00, 0x33, 0xFF, // IDR
];

fn delta_frame(sequence: u32) -> Bytes {
    let mut chunk = vec![0x00, 0x00, 0x00, 0x01, 0x41, 0x9A];
    chunk.extend_from_slice(&sequence.to_be_bytes());
    Bytes::from(chunk)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5006".to_string())
        .parse()?;

    let config = BridgeConfig::default()
        .bind(bind_addr)
        .settle_delay(Duration::from_millis(100))
        .cache_path(std::env::temp_dir().join("carplay-demo-params.json"));

    let dongle = Arc::new(MockDongle::with_settings(config.dongle.clone()));
    let events = resolve_event_source(dongle.as_ref())?;
    let driver: Arc<dyn DongleDriver> = dongle.clone();

    let cache = Arc::new(ParamSetCache::new());
    let store = Arc::new(JsonFileStore::new(&config.cache_path));
    let cell = Arc::new(StatusCell::new());
    let registry = Arc::new(ViewerRegistry::new(
        Arc::clone(&cell),
        Arc::clone(&cache),
        Some(Arc::clone(&driver)),
    ));
    let tracker = Arc::new(StatusTracker::new(cell, Arc::clone(&registry)));

    let extractor = ParamSetExtractor::new(cache, store);
    tokio::spawn(EventPump::new(Arc::clone(&registry), Arc::clone(&tracker), extractor).run(events));

    {
        let tracker = Arc::clone(&tracker);
        let settle = config.settle_delay;
        let retry = config.retry_delay;
        tokio::spawn(async move {
            tracker.run_start_sequence(driver, settle, retry).await;
        });
    }

    // Feed the pattern at 30 fps, keyframe group once a second
    {
        let dongle = Arc::clone(&dongle);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(33));
            let mut sequence: u32 = 0;
            loop {
                ticker.tick().await;
                if sequence % 30 == 0 {
                    dongle.push(DriverMessage::Video(Bytes::from_static(KEYFRAME_GROUP)));
                } else {
                    dongle.push(DriverMessage::Video(delta_frame(sequence)));
                }
                sequence = sequence.wrapping_add(1);
            }
        });
    }

    println!("Simulated bridge on ws://{}", bind_addr);
    println!();
    println!("Watch it: cargo run --example headless_viewer ws://{}", bind_addr);
    println!();

    let server = BridgeServer::new(config, registry);
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            let touches = dongle.touches().await;
            println!("\n{} touches routed to the mock dongle, shutting down", touches.len());
        }
    }

    Ok(())
}
