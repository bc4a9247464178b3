//! Bridge configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Bridge configuration options
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address the viewer WebSocket server binds to
    pub bind_addr: SocketAddr,

    /// Delay between issuing `Connecting` and the first driver start attempt,
    /// giving the USB bus time to settle
    pub settle_delay: Duration,

    /// Fixed delay between failed start attempts (not exponential)
    pub retry_delay: Duration,

    /// Capacity of the raw driver event channel
    pub event_capacity: usize,

    /// Durable cache file for the extracted SPS/PPS
    pub cache_path: PathBuf,

    /// Enable TCP_NODELAY on viewer sockets
    pub tcp_nodelay: bool,

    /// Device parameters handed to the dongle driver
    pub dongle: DongleSettings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5006".parse().unwrap(),
            settle_delay: Duration::from_millis(1000),
            retry_delay: Duration::from_millis(5000),
            event_capacity: 256,
            cache_path: PathBuf::from("parameter-sets.json"),
            tcp_nodelay: true, // Important for low latency
            dongle: DongleSettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Create a new config with a custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the settle delay before the first start attempt
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the fixed retry delay for failed start attempts
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the durable cache file path
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// Set the dongle device parameters
    pub fn dongle(mut self, settings: DongleSettings) -> Self {
        self.dongle = settings;
        self
    }
}

/// Device parameters for the dongle driver
///
/// Mirrors the configuration record vendor drivers take at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DongleSettings {
    /// Rendered display width in pixels
    pub width: u32,

    /// Rendered display height in pixels
    pub height: u32,

    /// Target frame rate
    pub fps: u32,

    /// Display density reported to the phone
    pub dpi: u32,

    /// Start in night mode
    pub night_mode: bool,

    /// Device name advertised to the phone
    pub box_name: String,
}

impl Default for DongleSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            fps: 60,
            dpi: 160,
            night_mode: false,
            box_name: "carplay-bridge".to_string(),
        }
    }
}

impl DongleSettings {
    /// Set the display geometry
    pub fn geometry(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the display density
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }
}
