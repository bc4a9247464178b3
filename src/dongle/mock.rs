//! Loopback driver for development and tests
//!
//! Behaves like a vendor driver that never finds hardware traffic of its
//! own: starts succeed (or fail a scripted number of times), touches are
//! recorded, and anything pushed into it comes back out of the event feed
//! like real driver traffic.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use crate::config::DongleSettings;
use crate::dongle::driver::{DongleDriver, DriverError, EventSource, TouchEvent};
use crate::dongle::event::DriverMessage;

/// Which capability the mock advertises, for exercising the startup probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedExposure {
    /// Feed on the instance (modern builds)
    Instance,
    /// Feed only on the nested driver handle (older builds)
    Nested,
    /// No feed at all (misconfigured build)
    None,
}

/// Scriptable in-process driver
pub struct MockDongle {
    settings: DongleSettings,
    exposure: FeedExposure,
    tx: broadcast::Sender<DriverMessage>,
    remaining_start_failures: AtomicU32,
    touches: Mutex<Vec<TouchEvent>>,
}

impl MockDongle {
    pub fn new() -> Self {
        Self::with_settings(DongleSettings::default())
    }

    pub fn with_settings(settings: DongleSettings) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            settings,
            exposure: FeedExposure::Instance,
            tx,
            remaining_start_failures: AtomicU32::new(0),
            touches: Mutex::new(Vec::new()),
        }
    }

    /// Resize the event feed; existing subscriptions are dropped
    pub fn feed_capacity(mut self, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        self.tx = tx;
        self
    }

    /// Fail the next `count` start attempts
    pub fn fail_starts(self, count: u32) -> Self {
        self.remaining_start_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Change which capability the probe will find
    pub fn exposure(mut self, exposure: FeedExposure) -> Self {
        self.exposure = exposure;
        self
    }

    /// Push a raw message into the event feed
    pub fn push(&self, message: DriverMessage) {
        // No receivers yet is fine
        let _ = self.tx.send(message);
    }

    /// Touches received so far
    pub async fn touches(&self) -> Vec<TouchEvent> {
        self.touches.lock().await.clone()
    }

    pub fn settings(&self) -> &DongleSettings {
        &self.settings
    }
}

impl Default for MockDongle {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for MockDongle {
    fn subscribe(&self) -> broadcast::Receiver<DriverMessage> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl DongleDriver for MockDongle {
    fn event_source(&self) -> Option<&dyn EventSource> {
        match self.exposure {
            FeedExposure::Instance => Some(self),
            _ => None,
        }
    }

    fn nested_driver(&self) -> Option<&dyn EventSource> {
        match self.exposure {
            FeedExposure::Nested => Some(self),
            _ => None,
        }
    }

    async fn start(&self) -> Result<(), DriverError> {
        if self.remaining_start_failures.load(Ordering::SeqCst) > 0 {
            self.remaining_start_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(DriverError::Start("no dongle attached".to_string()));
        }

        tracing::debug!(
            width = self.settings.width,
            height = self.settings.height,
            fps = self.settings.fps,
            "Mock dongle started"
        );
        Ok(())
    }

    async fn send_touch(&self, touch: TouchEvent) -> Result<(), DriverError> {
        self.touches.lock().await.push(touch);
        Ok(())
    }
}
