//! Dongle event pump
//!
//! Single consumer of the driver's event feed. Every message is normalized
//! into a canonical [`DongleEvent`](crate::dongle::DongleEvent) and routed:
//! media fans out to viewers, status lands in the tracker, fatal faults
//! terminate the process.
//!
//! Video handling order matters: parameter-set extraction runs first so a
//! chunk's SPS/PPS is cached before anything downstream sees it, the chunk
//! is broadcast next, and only then does the tracker flip to `Streaming`.
//! Viewers therefore always hold the first chunk by the time the status
//! changes under them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::dongle::{normalize, DongleEvent, DriverMessage};
use crate::media::ParamSetExtractor;
use crate::relay::fault;
use crate::relay::registry::ViewerRegistry;
use crate::relay::status::{ConnectionStatus, StatusTracker};

/// Routes driver events to viewers, the status tracker, and the
/// parameter-set extractor
pub struct EventPump {
    registry: Arc<ViewerRegistry>,
    tracker: Arc<StatusTracker>,
    extractor: ParamSetExtractor,
    early_audio_logged: AtomicBool,
}

impl EventPump {
    pub fn new(
        registry: Arc<ViewerRegistry>,
        tracker: Arc<StatusTracker>,
        extractor: ParamSetExtractor,
    ) -> Self {
        Self {
            registry,
            tracker,
            extractor,
            early_audio_logged: AtomicBool::new(false),
        }
    }

    /// Consume the driver feed until it closes
    ///
    /// A lagged receiver logs the drop count and keeps going; live video
    /// tolerates gaps better than a stalled pump.
    pub async fn run(self, mut events: broadcast::Receiver<DriverMessage>) {
        tracing::info!("Event pump started");

        loop {
            match events.recv().await {
                Ok(message) => {
                    tracing::trace!(kind = message.kind(), "Driver message received");
                    if let Some(event) = normalize(message) {
                        self.dispatch(event).await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event feed lagging, dropped messages");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event feed closed, pump stopping");
                    break;
                }
            }
        }
    }

    async fn dispatch(&self, event: DongleEvent) {
        match event {
            DongleEvent::Video(data) => {
                self.extractor.scan_chunk(&data).await;
                self.registry.broadcast_video(data).await;
                self.tracker.on_video().await;
            }
            DongleEvent::Audio(data) => {
                // Audio tends to come up before video on real hardware;
                // call that out once instead of on every chunk
                if !self.early_audio_logged.load(Ordering::Relaxed) {
                    let status = self.tracker.current().await;
                    if matches!(
                        status,
                        ConnectionStatus::Connecting { .. } | ConnectionStatus::WaitingForDevice
                    ) {
                        self.early_audio_logged.store(true, Ordering::Relaxed);
                        tracing::info!(len = data.len(), "Audio traffic started ahead of video");
                    }
                }
                self.registry.broadcast_audio(data).await;
            }
            DongleEvent::Status(status) => {
                self.tracker.publish(status).await;
            }
            DongleEvent::Quit => {
                tracing::info!("Device session ended");
                self.tracker.on_quit().await;
            }
            DongleEvent::Error(message) => {
                tracing::error!(error = %message, "Driver reported an error");
                if fault::is_fatal_driver_error(&message) {
                    fault::terminate(&message);
                }
            }
            DongleEvent::Failure => {
                fault::terminate("driver failure signal");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dongle::{DispatchMessage, DispatchPayload, EventSource, MockDongle};
    use crate::media::{ParamSetCache, ParamSetStore, PersistedParams};
    use crate::relay::registry::ViewerFrame;
    use crate::relay::status::{ConnectionStatus, StatusCell};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct NullStore;

    #[async_trait]
    impl ParamSetStore for NullStore {
        async fn load(&self) -> crate::error::Result<Option<PersistedParams>> {
            Ok(None)
        }

        async fn save(&self, _params: &PersistedParams) -> crate::error::Result<()> {
            Ok(())
        }
    }

    struct Rig {
        dongle: Arc<MockDongle>,
        registry: Arc<ViewerRegistry>,
        cache: Arc<ParamSetCache>,
        pump: tokio::task::JoinHandle<()>,
    }

    fn start_pump() -> Rig {
        let dongle = Arc::new(MockDongle::new());
        let cache = Arc::new(ParamSetCache::new());
        let cell = Arc::new(StatusCell::new());
        let registry = Arc::new(ViewerRegistry::new(
            Arc::clone(&cell),
            Arc::clone(&cache),
            None,
        ));
        let tracker = Arc::new(StatusTracker::new(cell, Arc::clone(&registry)));
        let extractor = ParamSetExtractor::new(Arc::clone(&cache), Arc::new(NullStore));
        let pump = EventPump::new(Arc::clone(&registry), tracker, extractor);

        let events = dongle.subscribe();
        let pump = tokio::spawn(pump.run(events));

        Rig {
            dongle,
            registry,
            cache,
            pump,
        }
    }

    async fn finish(rig: Rig) {
        // Dropping the dongle closes the feed and lets the pump exit
        let Rig { dongle, pump, .. } = rig;
        drop(dongle);
        let _ = tokio::time::timeout(Duration::from_secs(1), pump).await;
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ViewerFrame>) -> Vec<ViewerFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_video_broadcast_then_streaming_status() {
        let rig = start_pump();
        let (_id, mut rx) = rig.registry.register().await;

        let chunk = Bytes::from_static(&[0x00, 0x00, 0x00, 0x01, 0x67, 0xAA]);
        rig.dongle.push(DriverMessage::Video(chunk.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let frames = drain(&mut rx);
        assert_eq!(
            frames,
            vec![
                ViewerFrame::Status(ConnectionStatus::Disconnected),
                ViewerFrame::Video(chunk),
                ViewerFrame::Status(ConnectionStatus::Streaming),
            ]
        );

        // The extractor saw the chunk before it was broadcast
        let params = rig.cache.snapshot().await;
        assert_eq!(params.sps.as_deref(), Some(&[0x67, 0xAA][..]));

        finish(rig).await;
    }

    #[tokio::test]
    async fn test_audio_broadcast_without_status_change() {
        let rig = start_pump();
        let (_id, mut rx) = rig.registry.register().await;

        rig.dongle
            .push(DriverMessage::Audio(Bytes::from_static(&[0x11, 0x22])));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let frames = drain(&mut rx);
        assert_eq!(
            frames,
            vec![
                ViewerFrame::Status(ConnectionStatus::Disconnected),
                ViewerFrame::Audio(Bytes::from_static(&[0x11, 0x22])),
            ]
        );

        finish(rig).await;
    }

    #[tokio::test]
    async fn test_driver_status_passes_through() {
        let rig = start_pump();
        let (_id, mut rx) = rig.registry.register().await;

        rig.dongle
            .push(DriverMessage::Status(ConnectionStatus::error(
                "Phone rejected session",
            )));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let frames = drain(&mut rx);
        assert!(frames.contains(&ViewerFrame::Status(ConnectionStatus::error(
            "Phone rejected session"
        ))));

        finish(rig).await;
    }

    #[tokio::test]
    async fn test_dispatch_unplugged_resets_status() {
        let rig = start_pump();
        let (_id, mut rx) = rig.registry.register().await;

        rig.dongle.push(DriverMessage::Video(Bytes::from_static(&[
            0x00, 0x00, 0x00, 0x01, 0x41,
        ])));
        rig.dongle.push(DriverMessage::Dispatch(DispatchMessage::new(
            "unplugged",
            DispatchPayload::Empty,
        )));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let frames = drain(&mut rx);
        assert_eq!(
            frames.last(),
            Some(&ViewerFrame::Status(ConnectionStatus::Disconnected))
        );

        finish(rig).await;
    }

    #[tokio::test]
    async fn test_recoverable_error_keeps_pump_alive() {
        let rig = start_pump();
        let (_id, mut rx) = rig.registry.register().await;

        rig.dongle
            .push(DriverMessage::Error("LIBUSB_ERROR_TIMEOUT".into()));
        rig.dongle
            .push(DriverMessage::Audio(Bytes::from_static(&[0x33])));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let frames = drain(&mut rx);
        assert!(frames.contains(&ViewerFrame::Audio(Bytes::from_static(&[0x33]))));

        finish(rig).await;
    }

    #[tokio::test]
    async fn test_lagged_feed_resumes() {
        let dongle = Arc::new(MockDongle::new());
        let events = dongle.subscribe();

        // Overflow the feed before the pump gets to run
        for _ in 0..200 {
            dongle.push(DriverMessage::Audio(Bytes::from_static(&[0x44])));
        }

        let cache = Arc::new(ParamSetCache::new());
        let cell = Arc::new(StatusCell::new());
        let registry = Arc::new(ViewerRegistry::new(
            Arc::clone(&cell),
            Arc::clone(&cache),
            None,
        ));
        let (_id, mut rx) = registry.register().await;
        let tracker = Arc::new(StatusTracker::new(cell, Arc::clone(&registry)));
        let extractor = ParamSetExtractor::new(cache, Arc::new(NullStore));
        let pump = tokio::spawn(EventPump::new(Arc::clone(&registry), tracker, extractor).run(events));

        drop(dongle);
        let _ = tokio::time::timeout(Duration::from_secs(1), pump).await;

        let audio = drain(&mut rx)
            .into_iter()
            .filter(|f| matches!(f, ViewerFrame::Audio(_)))
            .count();
        assert!(audio > 0, "pump should survive the lag");
        assert!(audio < 200, "feed overflow should have dropped messages");
    }
}
