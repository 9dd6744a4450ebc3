//! # rvcbridge-adapter-mqtt
//!
//! MQTT adapter — bridges the entity world onto an MQTT broker.
//!
//! ## Responsibilities
//! - Connect to the broker with an `offline` last-will on the
//!   availability topic
//! - Publish retained discovery config payloads and `online` on connect
//! - Translate [`BridgeEvent`]s into state/feedback topic publications
//! - Subscribe to the command tree and translate publications into
//!   [`CandidateCommand`]s for the egress pipeline
//!
//! ## Dependency rule
//! Depends on `rvcbridge-domain` only: the broker side talks to the
//! pipelines through plain channels, not through the bus-facing ports.

mod config;
pub mod discovery;
mod error;
pub mod topic;

pub use config::MqttConfig;
pub use error::MqttError;

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use tokio::sync::{broadcast, mpsc, watch};

use rvcbridge_domain::command::CandidateCommand;
use rvcbridge_domain::entity::EntityIndex;
use rvcbridge_domain::event::BridgeEvent;

/// Delay before polling again after an event-loop error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// The broker-side bridge: command ingress and event egress in one task.
pub struct MqttBridge {
    config: MqttConfig,
    index: Arc<EntityIndex>,
}

impl MqttBridge {
    /// Create a bridge over the loaded entity index.
    #[must_use]
    pub fn new(config: MqttConfig, index: Arc<EntityIndex>) -> Self {
        Self { config, index }
    }

    /// Connect and run until shutdown turns true.
    ///
    /// Incoming command publications are parsed and forwarded to
    /// `commands`; events received from `events` are published to their
    /// topics. The broker connection is re-established by the underlying
    /// event loop; on reconnect the subscriptions, discovery payloads
    /// and `online` availability are replayed.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError`] only for unrecoverable client failures;
    /// connection losses are retried internally.
    pub async fn run(
        &self,
        commands: mpsc::Sender<CandidateCommand>,
        mut events: broadcast::Receiver<BridgeEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), MqttError> {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.broker_host.clone(),
            self.config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(self.config.keep_alive_secs)));
        options.set_last_will(LastWill::new(
            topic::availability_topic(&self.config.base_topic),
            "offline",
            QoS::AtLeastOnce,
            true,
        ));
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, mut event_loop) = AsyncClient::new(options, 64);
        let shutdown_snapshot = shutdown.clone();

        loop {
            tokio::select! {
                event = event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!(
                            broker = %self.config.broker_host,
                            port = self.config.broker_port,
                            "connected to the MQTT broker"
                        );
                        self.on_connect(&client).await?;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let payload = String::from_utf8_lossy(&publish.payload);
                        let Some(cmd) = topic::parse_command(
                            &self.config.base_topic,
                            &publish.topic,
                            &payload,
                        ) else {
                            tracing::debug!(topic = %publish.topic, "ignoring non-command publication");
                            continue;
                        };
                        tracing::debug!(
                            entity_id = %cmd.entity_id,
                            topic = %publish.topic,
                            "command received"
                        );
                        if commands.send(cmd).await.is_err() {
                            tracing::debug!("command channel closed, MQTT bridge stopping");
                            return Ok(());
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "MQTT event loop error, retrying");
                        let mut shutdown_wait = shutdown_snapshot.clone();
                        if wait_or_shutdown(RECONNECT_DELAY, &mut shutdown_wait).await {
                            return Ok(());
                        }
                    }
                },
                event = events.recv() => match event {
                    Ok(event) => self.publish_event(&client, event).await?,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "event subscriber lagged, state updates dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("event bus closed, MQTT bridge stopping");
                        return Ok(());
                    }
                },
                _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                    let _ = client
                        .publish(
                            topic::availability_topic(&self.config.base_topic),
                            QoS::AtLeastOnce,
                            true,
                            "offline",
                        )
                        .await;
                    let _ = client.disconnect().await;
                    return Ok(());
                }
            }
        }
    }

    /// Subscriptions, discovery and availability, replayed on every
    /// (re)connect.
    async fn on_connect(&self, client: &AsyncClient) -> Result<(), MqttError> {
        for filter in topic::command_filters(&self.config.base_topic) {
            client.subscribe(filter, QoS::AtLeastOnce).await?;
        }

        if self.config.discovery_enabled {
            let messages = discovery::discovery_messages(
                &self.index,
                &self.config.base_topic,
                &self.config.discovery_prefix,
            );
            let count = messages.len();
            for (topic, payload) in messages {
                client
                    .publish(topic, QoS::AtLeastOnce, true, payload.to_string())
                    .await?;
            }
            tracing::info!(entities = count, "discovery payloads published");
        }

        client
            .publish(
                topic::availability_topic(&self.config.base_topic),
                QoS::AtLeastOnce,
                true,
                "online",
            )
            .await?;
        Ok(())
    }

    async fn publish_event(
        &self,
        client: &AsyncClient,
        event: BridgeEvent,
    ) -> Result<(), MqttError> {
        let base = &self.config.base_topic;
        match event {
            BridgeEvent::State(state) => {
                client
                    .publish(
                        topic::state_topic(base, &state),
                        QoS::AtMostOnce,
                        self.config.retain_state,
                        state.value.to_string(),
                    )
                    .await?;
            }
            BridgeEvent::Ack(ack) => {
                let payload = serde_json::to_string(&ack).unwrap_or_default();
                client
                    .publish(topic::ack_topic(base), QoS::AtLeastOnce, false, payload)
                    .await?;
            }
            BridgeEvent::Failure(failure) => {
                let payload = serde_json::to_string(&failure).unwrap_or_default();
                client
                    .publish(topic::error_topic(base), QoS::AtLeastOnce, false, payload)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Sleep for `delay`, returning early (true) when shutdown turns true.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => false,
        _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => true,
    }
}
