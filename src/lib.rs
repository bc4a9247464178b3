//! carplay-bridge
//!
//! A lightweight relay that turns a USB CarPlay dongle into a service any
//! browser can watch. The vendor driver hands us raw H.264 video, PCM
//! audio, and connection status; the bridge fans all of it out to
//! WebSocket viewers and carries their touch input back to the device.
//!
//! # Features
//!
//! - Zero-copy media fan-out using `bytes::Bytes` and per-session channels
//! - Late joiners primed with the current status and cached SPS/PPS so
//!   decoding starts without waiting for the next keyframe
//! - Durable parameter-set cache persisted as base64 JSON across restarts
//! - Connection status state machine with automatic dongle start retry
//! - Viewer-driven video simulation for development without hardware
//! - Fatal USB fault detection that exits for a supervisor restart
//!
//! # Architecture
//!
//! ```text
//!   USB dongle driver
//!         │ DriverMessage
//!         ▼
//!    [EventPump] ──► [ParamSetExtractor] ──► cache ──► disk
//!         │
//!         ├──► [StatusTracker] ──► status cell
//!         ▼
//!   [ViewerRegistry] ◄── touch / simulation ── [BridgeServer]
//!         │                                         ▲
//!         └── ViewerFrame per session ──────────────┘
//!                                                   │ WebSocket
//!                                              [ browsers ]
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use carplay_bridge::config::BridgeConfig;
//! use carplay_bridge::media::ParamSetCache;
//! use carplay_bridge::relay::{StatusCell, ViewerRegistry};
//! use carplay_bridge::server::BridgeServer;
//!
//! #[tokio::main]
//! async fn main() -> carplay_bridge::Result<()> {
//!     let config = BridgeConfig::default();
//!     let cache = Arc::new(ParamSetCache::new());
//!     let cell = Arc::new(StatusCell::new());
//!     let registry = Arc::new(ViewerRegistry::new(
//!         Arc::clone(&cell),
//!         Arc::clone(&cache),
//!         None,
//!     ));
//!
//!     let server = BridgeServer::new(config, registry);
//!     server.run().await
//! }
//! ```
//!
//! The binary in `src/main.rs` wires the full pipeline: driver probe,
//! event pump, status start sequence, and the WebSocket endpoint.

pub mod config;
pub mod dongle;
pub mod error;
pub mod media;
pub mod relay;
pub mod server;

pub use config::{BridgeConfig, DongleSettings};
pub use error::{BridgeError, Result};
pub use relay::{ConnectionStatus, EventPump, StatusTracker, ViewerRegistry};
pub use server::BridgeServer;
