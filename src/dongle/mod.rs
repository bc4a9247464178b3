//! Dongle driver boundary
//!
//! Everything the bridge knows about the hardware side lives here: the
//! driver trait a vendor implementation plugs into, the raw message shapes
//! different driver builds emit, the normalization onto the canonical event
//! set, and a loopback mock for development.
//!
//! ```text
//!   vendor driver ──► DriverMessage ──► normalize() ──► DongleEvent
//!   (trait impl)      (either shape)                    (one shape)
//! ```

pub mod driver;
pub mod event;
pub mod mock;

pub use driver::{
    resolve_event_source, DongleDriver, DriverError, EventSource, TouchAction, TouchEvent,
};
pub use event::{normalize, DispatchMessage, DispatchPayload, DongleEvent, DriverMessage};
pub use mock::{FeedExposure, MockDongle};
