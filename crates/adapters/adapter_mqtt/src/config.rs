//! MQTT adapter configuration.

use serde::Deserialize;

/// Configuration for the MQTT broker connection and topic layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker hostname or address.
    pub broker_host: String,
    /// Broker TCP port.
    pub broker_port: u16,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Optional credentials.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Root of the state/command topic tree (e.g. `rv`).
    pub base_topic: String,
    /// Publish retained discovery config payloads on connect.
    pub discovery_enabled: bool,
    /// Discovery topic prefix.
    pub discovery_prefix: String,
    /// Retain entity state publications.
    pub retain_state: bool,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1883,
            client_id: "rvcbridge".to_string(),
            username: None,
            password: None,
            base_topic: "rv".to_string(),
            discovery_enabled: true,
            discovery_prefix: "homeassistant".to_string(),
            retain_state: false,
            keep_alive_secs: 30,
        }
    }
}
