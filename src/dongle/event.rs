//! Driver event shapes and normalization
//!
//! Vendor driver builds disagree about how events come out: newer ones emit
//! typed events directly, older ones push everything through one callback
//! with a string discriminator. Both shapes arrive here as
//! [`DriverMessage`]; [`normalize`] maps each onto at most one event of the
//! canonical [`DongleEvent`] set the rest of the bridge consumes.

use bytes::Bytes;

use crate::relay::status::ConnectionStatus;

/// Raw message as emitted by a driver build
#[derive(Debug, Clone, PartialEq)]
pub enum DriverMessage {
    /// Video chunk, raw Annex-B bytes
    Video(Bytes),
    /// Audio chunk, opaque encoded bytes
    Audio(Bytes),
    /// Driver-reported status
    Status(ConnectionStatus),
    /// Session ended (phone side)
    Quit,
    /// Low-level I/O error with the driver's message text
    Error(String),
    /// Unrecoverable failure signal
    Failure,
    /// Legacy single-callback form
    Dispatch(DispatchMessage),
}

impl DriverMessage {
    /// Message kind as a log field
    pub fn kind(&self) -> &str {
        match self {
            DriverMessage::Video(_) => "video",
            DriverMessage::Audio(_) => "audio",
            DriverMessage::Status(_) => "status",
            DriverMessage::Quit => "quit",
            DriverMessage::Error(_) => "error",
            DriverMessage::Failure => "failure",
            DriverMessage::Dispatch(dispatch) => &dispatch.kind,
        }
    }
}

/// Legacy dispatch-callback message: a string discriminator plus payload
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchMessage {
    pub kind: String,
    pub payload: DispatchPayload,
}

impl DispatchMessage {
    pub fn new(kind: impl Into<String>, payload: DispatchPayload) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Payload of a legacy dispatch message
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchPayload {
    /// Media bytes (`video`, `audio`)
    Media(Bytes),
    /// Status record (`status`)
    Status(ConnectionStatus),
    /// No payload (`plugged`, `unplugged`, ...)
    Empty,
}

/// Canonical event set consumed by the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum DongleEvent {
    Video(Bytes),
    Audio(Bytes),
    Status(ConnectionStatus),
    Quit,
    Error(String),
    Failure,
}

/// Map one raw message onto at most one canonical event
///
/// Payload bytes pass through untouched. Unknown dispatch kinds and
/// kind/payload mismatches are logged and dropped; they never fail.
pub fn normalize(message: DriverMessage) -> Option<DongleEvent> {
    match message {
        DriverMessage::Video(data) => Some(DongleEvent::Video(data)),
        DriverMessage::Audio(data) => Some(DongleEvent::Audio(data)),
        DriverMessage::Status(status) => Some(DongleEvent::Status(status)),
        DriverMessage::Quit => Some(DongleEvent::Quit),
        DriverMessage::Error(message) => Some(DongleEvent::Error(message)),
        DriverMessage::Failure => Some(DongleEvent::Failure),
        DriverMessage::Dispatch(dispatch) => normalize_dispatch(dispatch),
    }
}

fn normalize_dispatch(message: DispatchMessage) -> Option<DongleEvent> {
    match (message.kind.as_str(), message.payload) {
        ("video", DispatchPayload::Media(data)) => Some(DongleEvent::Video(data)),
        ("audio", DispatchPayload::Media(data)) => Some(DongleEvent::Audio(data)),
        ("status", DispatchPayload::Status(status)) => Some(DongleEvent::Status(status)),
        ("unplugged", _) => {
            tracing::info!("Phone unplugged");
            Some(DongleEvent::Quit)
        }
        ("plugged", _) => {
            tracing::info!("Phone plugged in");
            None
        }
        (kind, _) => {
            tracing::debug!(kind = kind, "Dropping unrecognized driver message");
            None
        }
    }
}
