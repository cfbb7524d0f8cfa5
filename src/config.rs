//! Server configuration from the environment

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

const DEFAULT_PORT: u16 = 8765;
const DEFAULT_SINK_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Upper bound on a blocking agent call; `None` waits indefinitely
    pub wait_timeout: Option<Duration>,
    /// Outbound frames buffered per observer before it is disconnected
    pub sink_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            wait_timeout: None,
            sink_buffer: DEFAULT_SINK_BUFFER,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let host = lookup("HEADLOCK_HOST")
            .and_then(|h| h.parse().ok())
            .unwrap_or(defaults.host);
        let port = lookup("HEADLOCK_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);
        let wait_timeout = lookup("HEADLOCK_WAIT_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let sink_buffer = lookup("HEADLOCK_SINK_BUFFER")
            .and_then(|b| b.parse().ok())
            .filter(|b: &usize| *b > 0)
            .unwrap_or(defaults.sink_buffer);

        Self {
            host,
            port,
            wait_timeout,
            sink_buffer,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
