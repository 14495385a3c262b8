//! Transport limits and timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Smallest connect timeout handed to a connector. A zero timeout is
/// rejected by `TcpStream::connect_timeout`, so it is raised to this.
pub const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(1);

/// Bounds applied to a single exchange.
///
/// Deserializes with every field optional, so a host can load a partial
/// configuration and keep the defaults for the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Timeout for each individual connect attempt. Values below
    /// [`MIN_CONNECT_TIMEOUT`] are raised to it when connecting.
    pub connect_timeout: Duration,
    /// Total time allowed for the receive phase. `None` waits forever.
    pub receive_timeout: Option<Duration>,
    /// Largest response accepted before the exchange is abandoned.
    pub max_response_size: usize,
    /// Size of the reusable read buffer.
    pub read_buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            receive_timeout: Some(Duration::from_secs(30)),
            max_response_size: 16 * 1024 * 1024,
            read_buffer_size: 512,
        }
    }
}

impl TransportConfig {
    /// Values below [`MIN_CONNECT_TIMEOUT`] are raised to it.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout.max(MIN_CONNECT_TIMEOUT);
        self
    }

    /// The connect timeout actually passed to the connector.
    pub fn effective_connect_timeout(&self) -> Duration {
        self.connect_timeout.max(MIN_CONNECT_TIMEOUT)
    }

    pub fn with_receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn with_max_response_size(mut self, limit: usize) -> Self {
        self.max_response_size = limit;
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }
}
