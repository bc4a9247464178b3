//! Viewer-facing WebSocket server
//!
//! Browsers connect here. Outbound media rides binary frames with a
//! one-byte tag; everything else is a JSON text envelope.

pub mod protocol;
pub mod ws;

pub use protocol::{ClickPayload, ClientMessage, ServerMessage, FRAME_AUDIO, FRAME_VIDEO};
pub use ws::BridgeServer;
