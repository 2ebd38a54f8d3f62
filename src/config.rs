use std::net::SocketAddr;
use std::time::Duration;

use crate::packet::Mode;
use crate::{DEF_TIMEOUT_SEC, MAX_RETRY_COUNT};

/// TFTP client configuration
///
/// ```rust
/// use std::time::Duration;
/// use tftp_client::ClientConfig;
///
/// let config = ClientConfig::new("192.168.1.100:69".parse().unwrap())
///     .with_timeout(Duration::from_millis(500))
///     .with_max_retries(3);
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Well-known server address the request is sent to
    pub server: SocketAddr,
    /// Transfer mode named in the request
    pub mode: Mode,
    /// How long to wait for each reply
    pub timeout: Duration,
    /// Retransmissions allowed for one datagram before giving up
    pub max_retries: u8,
}

impl ClientConfig {
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            mode: Mode::Octet,
            timeout: Duration::from_secs(DEF_TIMEOUT_SEC),
            max_retries: MAX_RETRY_COUNT,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }
}
