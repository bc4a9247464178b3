//! Crate-wide error types
//!
//! Driver-boundary errors live in [`crate::dongle::DriverError`] and convert
//! into [`BridgeError`] at the point where they cross into bridge code.

use thiserror::Error;

use crate::dongle::DriverError;

/// Top-level error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Cache file error [{path}]: {reason}")]
    CacheFile { path: String, reason: String },
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, BridgeError>;
