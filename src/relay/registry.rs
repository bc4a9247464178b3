//! Viewer session registry
//!
//! Owns the set of connected viewer sessions and everything that fans out
//! to them. A joiner is primed with the current status and the cached
//! parameter sets before it can see live traffic. Publishes are
//! fire-and-forget over per-session unbounded channels, so a slow viewer
//! never blocks the dongle stream and a targeted send (join priming,
//! simulator traffic) stays cheap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use crate::dongle::{DongleDriver, TouchEvent};
use crate::media::ParamSetCache;
use crate::relay::status::{ConnectionStatus, StatusCell};

/// Identifies one viewer session for the registry's lifetime
pub type SessionId = u64;

/// One outbound frame for a viewer session
///
/// Cheap to clone: media payloads are reference-counted `Bytes`.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerFrame {
    Video(Bytes),
    Audio(Bytes),
    Status(ConnectionStatus),
}

struct SessionEntry {
    tx: mpsc::UnboundedSender<ViewerFrame>,
    simulator: bool,
}

/// Registry of connected viewer sessions
///
/// Thread-safe via `RwLock`; broadcasting only takes the read side.
pub struct ViewerRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    next_session_id: AtomicU64,
    status: Arc<StatusCell>,
    cache: Arc<ParamSetCache>,
    dongle: Option<Arc<dyn DongleDriver>>,
}

impl ViewerRegistry {
    /// Create a registry
    ///
    /// `dongle` is `None` in hardware-absent mode; touch routing is then a
    /// no-op.
    pub fn new(
        status: Arc<StatusCell>,
        cache: Arc<ParamSetCache>,
        dongle: Option<Arc<dyn DongleDriver>>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
            status,
            cache,
            dongle,
        }
    }

    /// Whether a dongle is attached to this registry
    pub fn has_dongle(&self) -> bool {
        self.dongle.is_some()
    }

    /// Register a new viewer session
    ///
    /// The returned receiver already holds the priming frames: current
    /// status first, then the cached SPS and PPS (when present) as video,
    /// ahead of anything live.
    pub async fn register(&self) -> (SessionId, mpsc::UnboundedReceiver<ViewerFrame>) {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        // Holding the write lock across priming keeps a status broadcast
        // from slipping between the snapshot and the insert
        let mut sessions = self.sessions.write().await;

        let _ = tx.send(ViewerFrame::Status(self.status.get().await));

        let params = self.cache.snapshot().await;
        let mut primed_units = 0;
        if let Some(sps) = params.sps {
            let _ = tx.send(ViewerFrame::Video(sps));
            primed_units += 1;
        }
        if let Some(pps) = params.pps {
            let _ = tx.send(ViewerFrame::Video(pps));
            primed_units += 1;
        }

        sessions.insert(
            id,
            SessionEntry {
                tx,
                simulator: false,
            },
        );

        tracing::info!(
            session_id = id,
            sessions = sessions.len(),
            primed_units = primed_units,
            "Viewer connected"
        );

        (id, rx)
    }

    /// Remove a session
    ///
    /// When a simulator leaves, the synthetic source is gone, so every
    /// remaining session is told the bridge is back to waiting for real
    /// hardware.
    pub async fn unregister(&self, id: SessionId) {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(&id);
            if removed.is_some() {
                tracing::info!(
                    session_id = id,
                    sessions = sessions.len(),
                    "Viewer disconnected"
                );
            }
            removed
        };

        if let Some(entry) = removed {
            if entry.simulator {
                tracing::info!(session_id = id, "Simulator left");
                self.broadcast_status(ConnectionStatus::WaitingForDevice)
                    .await;
            }
        }
    }

    /// Deliver a live video chunk to every session
    pub async fn broadcast_video(&self, data: Bytes) {
        self.broadcast(ViewerFrame::Video(data)).await;
    }

    /// Deliver an audio chunk to every session
    pub async fn broadcast_audio(&self, data: Bytes) {
        self.broadcast(ViewerFrame::Audio(data)).await;
    }

    /// Deliver a status value to every session
    pub async fn broadcast_status(&self, status: ConnectionStatus) {
        self.broadcast(ViewerFrame::Status(status)).await;
    }

    async fn broadcast(&self, frame: ViewerFrame) {
        let sessions = self.sessions.read().await;
        for entry in sessions.values() {
            // A failed send means the session is tearing down; unregister
            // reaps it
            let _ = entry.tx.send(frame.clone());
        }
    }

    /// Forward a touch to the dongle, if hardware is present
    pub async fn route_touch(&self, id: SessionId, touch: TouchEvent) {
        let Some(driver) = &self.dongle else {
            tracing::debug!(session_id = id, "Touch dropped, no dongle attached");
            return;
        };

        tracing::trace!(
            session_id = id,
            code = touch.code,
            x = touch.x,
            y = touch.y,
            "Routing touch"
        );

        if let Err(e) = driver.send_touch(touch).await {
            tracing::warn!(session_id = id, error = %e, "Touch rejected by driver");
        }
    }

    /// Pre-declare a session as the simulator
    pub async fn enable_simulation(&self, id: SessionId) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(&id) {
            if !entry.simulator {
                tracing::info!(session_id = id, "Session enabled simulation");
                entry.simulator = true;
            }
        }
    }

    /// Accept one simulated video chunk from `from`
    ///
    /// The chunk goes to every *other* session as video, each followed by a
    /// `Streaming` status. Simulated chunks skip parameter-set extraction:
    /// synthetic streams carry no device-originated headers worth caching.
    pub async fn send_simulated_video(&self, from: SessionId, data: Bytes) {
        let already_marked = {
            let sessions = self.sessions.read().await;
            match sessions.get(&from) {
                Some(entry) => entry.simulator,
                None => return,
            }
        };
        if !already_marked {
            self.enable_simulation(from).await;
        }

        let sessions = self.sessions.read().await;
        for (id, entry) in sessions.iter() {
            if *id == from {
                continue;
            }
            let _ = entry.tx.send(ViewerFrame::Video(data.clone()));
            let _ = entry
                .tx
                .send(ViewerFrame::Status(ConnectionStatus::Streaming));
        }
    }

    /// Number of connected sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether a session holds the simulator role
    pub async fn is_simulator(&self, id: SessionId) -> bool {
        let sessions = self.sessions.read().await;
        sessions.get(&id).map(|e| e.simulator).unwrap_or(false)
    }
}
