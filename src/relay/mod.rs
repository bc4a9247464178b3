//! Relay pipeline between the dongle and viewer sessions
//!
//! The relay owns everything between the driver's event feed and the
//! per-viewer outbound channels: status tracking, media fan-out, and fatal
//! fault handling.
//!
//! # Architecture
//!
//! ```text
//!    driver event feed (broadcast)
//!              │
//!              ▼
//!        [EventPump]──► ParamSetExtractor ──► cache + disk
//!              │
//!      ┌───────┴────────┐
//!      ▼                ▼
//! [StatusTracker]  Arc<ViewerRegistry>
//!      │           ┌──────────────────────────┐
//!      └─────────► │ sessions: HashMap<Id,    │
//!                  │   SessionEntry {         │
//!                  │     tx: mpsc::Unbounded, │
//!                  │     simulator,           │
//!                  │   }                      │
//!                  └───────────┬──────────────┘
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!          [Viewer]        [Viewer]        [Viewer]
//!          rx.recv()       rx.recv()       rx.recv()
//! ```
//!
//! # Zero-Copy Design
//!
//! Media payloads travel as `bytes::Bytes`, so fanning a chunk out to every
//! session clones a reference count, never the frame data.

pub mod fault;
pub mod pump;
pub mod registry;
pub mod status;

pub use pump::EventPump;
pub use registry::{SessionId, ViewerFrame, ViewerRegistry};
pub use status::{ConnectionStatus, StatusCell, StatusTracker};
