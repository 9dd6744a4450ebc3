//! MQTT adapter error types.

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The broker connection or event loop failed.
    #[error("MQTT connection error")]
    Connection(#[from] rumqttc::ConnectionError),

    /// A publish or subscribe request could not be queued.
    #[error("MQTT client error")]
    Client(#[from] rumqttc::ClientError),
}
