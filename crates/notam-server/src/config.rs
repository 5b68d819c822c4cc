//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use notam_advisory::WeatherConfig;
use notam_proto::FrameLimits;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8081;

/// Default maximum number of admitted clients.
pub const DEFAULT_MAX_CONNECTIONS: usize = 5;

/// Default prefix that marks a client id as an ATC station.
pub const DEFAULT_ATC_PREFIX: &str = "A";

/// Default idle timeout for sessions with work in progress.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default time allowed to finish a packet once its first bytes arrived.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-peer deadline for broadcast sends.
pub const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_secs(2);

/// Default capacity of each session's outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 32;

/// Default NOTAM database path.
pub const DEFAULT_NOTAM_FILE: &str = "notam_database.txt";

/// Configuration for the advisory server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrently admitted clients.
    pub max_connections: usize,
    /// Client ids starting with this prefix receive plan broadcasts.
    pub atc_prefix: String,
    /// Sessions silent for this long are closed. ATC stations with no
    /// submission in progress are exempt.
    pub idle_timeout: Duration,
    /// A partially received packet must be completed within this time.
    /// Applies to every session, ATC stations included.
    pub frame_timeout: Duration,
    /// Deadline for delivering a broadcast to one peer.
    pub broadcast_timeout: Duration,
    /// Capacity of each session's outbound queue.
    pub outbound_capacity: usize,
    /// Header and payload size limits.
    pub frame_limits: FrameLimits,
    /// NOTAM database path.
    pub notam_file: PathBuf,
    /// Weather service settings.
    pub weather: WeatherConfig,
}

impl ServerConfig {
    /// Create a configuration with default values for the given address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            atc_prefix: DEFAULT_ATC_PREFIX.to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            frame_limits: FrameLimits::new(),
            notam_file: PathBuf::from(DEFAULT_NOTAM_FILE),
            weather: WeatherConfig::default(),
        }
    }

    /// Set the maximum number of admitted clients.
    #[must_use]
    pub const fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the ATC client id prefix.
    #[must_use]
    pub fn with_atc_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.atc_prefix = prefix.into();
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the partial packet deadline.
    #[must_use]
    pub const fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Set the per-peer broadcast deadline.
    #[must_use]
    pub const fn with_broadcast_timeout(mut self, timeout: Duration) -> Self {
        self.broadcast_timeout = timeout;
        self
    }

    /// Set the outbound queue capacity.
    #[must_use]
    pub const fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Set the frame size limits.
    #[must_use]
    pub const fn with_frame_limits(mut self, limits: FrameLimits) -> Self {
        self.frame_limits = limits;
        self
    }

    /// Set the NOTAM database path.
    #[must_use]
    pub fn with_notam_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.notam_file = path.into();
        self
    }

    /// Set the weather service settings.
    #[must_use]
    pub fn with_weather(mut self, weather: WeatherConfig) -> Self {
        self.weather = weather;
        self
    }

    /// Whether `client_id` names an ATC station.
    #[must_use]
    pub fn is_atc(&self, client_id: &str) -> bool {
        client_id.starts_with(&self.atc_prefix)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            DEFAULT_PORT,
        ))
    }
}
