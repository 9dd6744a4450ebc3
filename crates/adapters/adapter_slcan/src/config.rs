//! SLCAN adapter configuration.

use serde::Deserialize;

/// Configuration for the SLCAN-over-TCP transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlcanConfig {
    /// Interface host (the CAN-to-TCP gateway).
    pub host: String,
    /// Interface TCP port.
    pub port: u16,
    /// Seconds to wait before a reconnection attempt.
    pub reconnect_delay_secs: u16,
    /// Seconds of receive silence after which the connection is
    /// considered dead and reopened.
    pub read_idle_timeout_secs: u16,
}

impl Default for SlcanConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3333,
            reconnect_delay_secs: 60,
            read_idle_timeout_secs: 30,
        }
    }
}

impl SlcanConfig {
    /// The `host:port` address to connect to.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
