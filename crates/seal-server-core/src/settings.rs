//! Server tuning knobs.

use std::net::SocketAddr;
use std::time::Duration;

/// Default listen address: every interface, port 8443.
pub const DEFAULT_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 8443);

/// Limits applied to every accepted connection.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Address to listen on.
    pub addr: SocketAddr,
    /// Time allowed for a client to send the request line and headers
    /// (Slowloris).
    pub read_header_timeout: Duration,
    /// Time allowed for the TLS handshake, and for reading each request
    /// body once headers are in (RUDY).
    pub read_timeout: Duration,
    /// Largest request body accepted; larger bodies get 413.
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR,
            read_header_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(10),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ServerSettings {
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }
}
