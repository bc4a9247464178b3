//! Viewer wire protocol
//!
//! Text frames carry a JSON envelope, `{"type": <name>, "data": <payload>}`.
//! Binary frames carry media with a one-byte tag prefix so a viewer can
//! route a chunk without parsing it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::dongle::TouchEvent;
use crate::error::Result;
use crate::relay::ConnectionStatus;

/// Binary frame tag for H.264 video
pub const FRAME_VIDEO: u8 = 0x01;

/// Binary frame tag for PCM audio
pub const FRAME_AUDIO: u8 = 0x02;

/// Outbound JSON envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Status(ConnectionStatus),
}

/// Inbound JSON envelope
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Pointer event in normalized `[0, 1]` screen coordinates
    Click(ClickPayload),
    /// Declares this session as a synthetic video source
    EnableSimulation,
}

/// Body of a `click` message
///
/// The action code is the driver's raw value: 14 down, 15 move, 16 up.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClickPayload {
    #[serde(rename = "type")]
    pub code: u32,
    pub x: f32,
    pub y: f32,
}

impl ClickPayload {
    pub fn touch(&self) -> TouchEvent {
        TouchEvent::new(self.code, self.x, self.y)
    }
}

/// Serialize an outbound message to its text form
pub fn encode_text(message: &ServerMessage) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Parse an inbound text frame
pub fn decode_text(text: &str) -> Result<ClientMessage> {
    Ok(serde_json::from_str(text)?)
}

/// Prefix a media payload with its binary tag
pub fn encode_binary(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 1);
    framed.push(tag);
    framed.extend_from_slice(payload);
    framed
}

/// Split a binary frame into its tag and payload
pub fn decode_binary(frame: &[u8]) -> Option<(u8, Bytes)> {
    let (&tag, payload) = frame.split_first()?;
    Some((tag, Bytes::copy_from_slice(payload)))
}
