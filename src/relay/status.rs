//! Connection status tracking
//!
//! One `ConnectionStatus` value exists per process. The tracker is its only
//! writer; every change is broadcast to all viewer sessions immediately, and
//! the registry reads the cell when priming a joiner.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::dongle::DongleDriver;
use crate::relay::registry::ViewerRegistry;

/// Dongle connection status as seen by every viewer
///
/// The `status` tag and snake_case names are the wire form viewers receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No dongle, or the phone was unplugged
    Disconnected,
    /// Driver start sequence in progress
    Connecting { message: String },
    /// Dongle up, no phone attached yet
    WaitingForDevice,
    /// Live video is flowing
    Streaming,
    /// Start attempt failed, retry scheduled
    Error { message: String },
}

impl ConnectionStatus {
    pub fn connecting(message: impl Into<String>) -> Self {
        ConnectionStatus::Connecting {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ConnectionStatus::Error {
            message: message.into(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, ConnectionStatus::Streaming)
    }

    /// The wire tag, for log fields
    pub fn tag(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting { .. } => "connecting",
            ConnectionStatus::WaitingForDevice => "waiting_for_device",
            ConnectionStatus::Streaming => "streaming",
            ConnectionStatus::Error { .. } => "error",
        }
    }
}

/// Holder for the single current status value
///
/// Writes go through [`StatusTracker`]; the registry only reads.
pub struct StatusCell {
    current: RwLock<ConnectionStatus>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(ConnectionStatus::Disconnected),
        }
    }

    /// The current status
    pub async fn get(&self) -> ConnectionStatus {
        self.current.read().await.clone()
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Single writer for the status cell, and owner of the dongle start sequence
pub struct StatusTracker {
    cell: Arc<StatusCell>,
    registry: Arc<ViewerRegistry>,
}

impl StatusTracker {
    pub fn new(cell: Arc<StatusCell>, registry: Arc<ViewerRegistry>) -> Self {
        Self { cell, registry }
    }

    /// The current status
    pub async fn current(&self) -> ConnectionStatus {
        self.cell.get().await
    }

    /// Overwrite the current status and broadcast it
    ///
    /// Driver-reported status lands here verbatim; the driver is
    /// authoritative when it says something.
    pub async fn publish(&self, status: ConnectionStatus) {
        {
            let mut current = self.cell.current.write().await;
            *current = status.clone();
        }

        tracing::debug!(status = status.tag(), "Status changed");
        self.registry.broadcast_status(status).await;
    }

    /// Note live video traffic
    ///
    /// The driver never announces streaming explicitly; the first video
    /// chunk is the signal. Broadcasts `Streaming` only on the transition.
    pub async fn on_video(&self) {
        {
            let mut current = self.cell.current.write().await;
            if current.is_streaming() {
                return;
            }
            *current = ConnectionStatus::Streaming;
        }

        tracing::info!("Video traffic started, now streaming");
        self.registry
            .broadcast_status(ConnectionStatus::Streaming)
            .await;
    }

    /// Phone unplugged or driver quit
    pub async fn on_quit(&self) {
        tracing::info!("Dongle session ended");
        self.publish(ConnectionStatus::Disconnected).await;
    }

    /// Drive the dongle start sequence, retrying forever on failure
    ///
    /// Each attempt announces `Connecting`, waits out the settle delay, then
    /// calls `start()`. Returns once the dongle is up.
    pub async fn run_start_sequence(
        &self,
        driver: Arc<dyn DongleDriver>,
        settle: Duration,
        retry: Duration,
    ) {
        loop {
            self.publish(ConnectionStatus::connecting("Initializing...")).await;

            // Give the USB bus a moment to settle before talking to the dongle
            tokio::time::sleep(settle).await;

            match driver.start().await {
                Ok(()) => {
                    tracing::info!("Dongle started, waiting for device");
                    self.publish(ConnectionStatus::WaitingForDevice).await;
                    return;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_ms = retry.as_millis() as u64,
                        "Dongle start failed"
                    );
                    self.publish(ConnectionStatus::error("Dongle not found. Retrying..."))
                        .await;
                    tokio::time::sleep(retry).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dongle::MockDongle;
    use crate::media::ParamSetCache;
    use crate::relay::registry::ViewerFrame;

    fn tracker() -> (StatusTracker, Arc<ViewerRegistry>) {
        let cell = Arc::new(StatusCell::new());
        let registry = Arc::new(ViewerRegistry::new(
            Arc::clone(&cell),
            Arc::new(ParamSetCache::new()),
            None,
        ));
        (StatusTracker::new(cell, Arc::clone(&registry)), registry)
    }

    fn collect_statuses(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<ViewerFrame>,
    ) -> Vec<ConnectionStatus> {
        let mut statuses = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let ViewerFrame::Status(status) = frame {
                statuses.push(status);
            }
        }
        statuses
    }

    #[test]
    fn test_wire_tags() {
        let connecting = serde_json::to_value(ConnectionStatus::connecting("Initializing...")).unwrap();
        assert_eq!(
            connecting,
            serde_json::json!({"status": "connecting", "message": "Initializing..."})
        );

        let waiting = serde_json::to_value(ConnectionStatus::WaitingForDevice).unwrap();
        assert_eq!(waiting, serde_json::json!({"status": "waiting_for_device"}));

        let parsed: ConnectionStatus =
            serde_json::from_value(serde_json::json!({"status": "streaming"})).unwrap();
        assert_eq!(parsed, ConnectionStatus::Streaming);
    }

    #[tokio::test]
    async fn test_initial_status_is_disconnected() {
        let (tracker, _registry) = tracker();
        assert_eq!(tracker.current().await, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_publish_overwrites_verbatim() {
        let (tracker, registry) = tracker();
        let (_id, mut rx) = registry.register().await;
        collect_statuses(&mut rx); // drop the join status

        tracker.publish(ConnectionStatus::WaitingForDevice).await;
        tracker.publish(ConnectionStatus::error("usb stack wedged")).await;

        assert_eq!(
            tracker.current().await,
            ConnectionStatus::error("usb stack wedged")
        );
        assert_eq!(
            collect_statuses(&mut rx),
            vec![
                ConnectionStatus::WaitingForDevice,
                ConnectionStatus::error("usb stack wedged"),
            ]
        );
    }

    #[tokio::test]
    async fn test_video_flips_streaming_exactly_once() {
        let (tracker, registry) = tracker();
        tracker.publish(ConnectionStatus::WaitingForDevice).await;

        let (_id, mut rx) = registry.register().await;
        collect_statuses(&mut rx);

        tracker.on_video().await;
        tracker.on_video().await;
        tracker.on_video().await;

        assert_eq!(collect_statuses(&mut rx), vec![ConnectionStatus::Streaming]);
        assert!(tracker.current().await.is_streaming());
    }

    #[tokio::test]
    async fn test_quit_forces_disconnected() {
        let (tracker, _registry) = tracker();
        tracker.publish(ConnectionStatus::Streaming).await;

        tracker.on_quit().await;

        assert_eq!(tracker.current().await, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_start_retries_until_success() {
        let (tracker, registry) = tracker();
        let (_id, mut rx) = registry.register().await;
        collect_statuses(&mut rx);

        let driver = Arc::new(MockDongle::new().fail_starts(5));
        tracker
            .run_start_sequence(
                driver,
                Duration::from_millis(1),
                Duration::from_millis(1),
            )
            .await;

        let statuses = collect_statuses(&mut rx);
        let errors = statuses
            .iter()
            .filter(|s| matches!(s, ConnectionStatus::Error { .. }))
            .count();
        let connecting = statuses
            .iter()
            .filter(|s| matches!(s, ConnectionStatus::Connecting { .. }))
            .count();

        assert_eq!(errors, 5);
        assert_eq!(connecting, 6); // one announcement per attempt
        assert_eq!(statuses.last(), Some(&ConnectionStatus::WaitingForDevice));
    }
}
