//! Dongle driver boundary
//!
//! The bridge never speaks the dongle's USB protocol itself; a vendor
//! driver does, behind [`DongleDriver`]. Driver builds differ in where the
//! event feed hangs: some expose it on the instance, older ones only on a
//! nested low-level driver handle. [`resolve_event_source`] probes the two
//! capabilities once at startup, preferring the instance, and the result is
//! never re-probed.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::dongle::event::DriverMessage;

/// Driver-boundary errors
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    /// Neither the instance nor a nested driver exposes an event feed
    #[error("Driver exposes no usable event source")]
    NoEventSource,

    #[error("Dongle start failed: {0}")]
    Start(String),

    #[error("Touch send failed: {0}")]
    Touch(String),
}

/// Known touch event codes in the dongle protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    Down = 14,
    Move = 15,
    Up = 16,
}

impl TouchAction {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            14 => Some(TouchAction::Down),
            15 => Some(TouchAction::Move),
            16 => Some(TouchAction::Up),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }
}

/// One touch event bound for the dongle
///
/// `x` and `y` are normalized to [0,1] against the viewer's rendered
/// surface. `code` passes through to the driver unvalidated; the driver
/// owns the code space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub code: u32,
    pub x: f32,
    pub y: f32,
}

impl TouchEvent {
    pub fn new(code: u32, x: f32, y: f32) -> Self {
        Self { code, x, y }
    }

    /// The named action for this code, when it is a known one
    pub fn action(&self) -> Option<TouchAction> {
        TouchAction::from_code(self.code)
    }
}

/// A live feed of raw driver messages
pub trait EventSource: Send + Sync {
    /// Subscribe to the feed; every subscriber sees every message
    fn subscribe(&self) -> broadcast::Receiver<DriverMessage>;
}

/// The vendor driver boundary
///
/// At most one driver instance exists per process; replacing it means
/// restarting the process.
#[async_trait]
pub trait DongleDriver: Send + Sync {
    /// Event feed on the instance itself, when this build has one
    fn event_source(&self) -> Option<&dyn EventSource> {
        None
    }

    /// Fallback feed on a nested low-level driver handle
    fn nested_driver(&self) -> Option<&dyn EventSource> {
        None
    }

    /// Bring the dongle up; may fail and be retried
    async fn start(&self) -> Result<(), DriverError>;

    /// Inject a touch event
    async fn send_touch(&self, touch: TouchEvent) -> Result<(), DriverError>;
}

/// Resolve a driver's event feed, once, at startup
pub fn resolve_event_source(
    driver: &dyn DongleDriver,
) -> Result<broadcast::Receiver<DriverMessage>, DriverError> {
    if let Some(source) = driver.event_source() {
        return Ok(source.subscribe());
    }

    if let Some(source) = driver.nested_driver() {
        tracing::warn!("Driver instance has no event feed, subscribing via nested driver");
        return Ok(source.subscribe());
    }

    Err(DriverError::NoEventSource)
}
