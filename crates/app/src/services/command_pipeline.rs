//! Command pipeline — the egress use-case: validate → rate-limit →
//! encode → transmit, with exactly one feedback record per command.
//!
//! The reference model is a single FIFO worker, so commands are processed
//! and acknowledged in arrival order. Errors in one command never affect
//! subsequent commands.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use rvcbridge_domain::command::{CandidateCommand, CommandValue, NormalizedCommand};
use rvcbridge_domain::encode::CommandEncoder;
use rvcbridge_domain::entity::EntityIndex;
use rvcbridge_domain::error::ErrorCode;
use rvcbridge_domain::event::{BridgeEvent, CommandAck, CommandFailure};

use crate::ports::{CanTransport, EventPublisher};
use crate::services::rate_limiter::RateLimiter;
use crate::services::transmitter::FrameTransmitter;
use crate::services::validator::CommandValidator;

/// The outbound command processor.
pub struct CommandPipeline<T, P> {
    index: Arc<EntityIndex>,
    validator: CommandValidator,
    limiter: RateLimiter,
    encoder: CommandEncoder,
    transmitter: FrameTransmitter<T>,
    publisher: P,
}

impl<T: CanTransport, P: EventPublisher> CommandPipeline<T, P> {
    /// Assemble the pipeline from its stages.
    #[must_use]
    pub fn new(
        index: Arc<EntityIndex>,
        validator: CommandValidator,
        limiter: RateLimiter,
        encoder: CommandEncoder,
        transmitter: FrameTransmitter<T>,
        publisher: P,
    ) -> Self {
        Self {
            index,
            validator,
            limiter,
            encoder,
            transmitter,
            publisher,
        }
    }

    /// Transmission statistics of the underlying transmitter.
    #[must_use]
    pub fn tx_stats(&self) -> crate::services::transmitter::TxStats {
        self.transmitter.stats()
    }

    /// Process one candidate command end to end, publishing its ack or
    /// failure record.
    pub async fn execute(&self, cmd: CandidateCommand) {
        match self.process(cmd).await {
            Ok(ack) => {
                tracing::info!(
                    entity_id = %ack.entity_id,
                    action = ack.action.as_str(),
                    latency_ms = ack.latency_ms,
                    "command transmitted"
                );
                self.publisher.publish(BridgeEvent::Ack(ack)).await;
            }
            Err(failure) => {
                tracing::warn!(
                    entity_id = %failure.entity_id,
                    code = failure.code.as_str(),
                    message = %failure.message,
                    "command rejected"
                );
                self.publisher.publish(BridgeEvent::Failure(failure)).await;
            }
        }
    }

    async fn process(&self, cmd: CandidateCommand) -> Result<CommandAck, CommandFailure> {
        let received_at = Instant::now();
        let entity_id = cmd.entity_id.clone();
        let fail = |code: ErrorCode, message: String| CommandFailure {
            entity_id: entity_id.clone(),
            code,
            message,
        };

        // Stages 1–4.
        let normalized = self
            .validator
            .validate(&cmd, received_at)
            .map_err(|err| fail(err.code, err.message))?;

        // Stage 5 — the serialized budget check. A rejection here, like
        // any earlier one, produces zero CAN frames.
        self.limiter
            .admit(&normalized.entity_id)
            .map_err(|err| fail(err.code(), err.to_string()))?;

        let desc = self.index.entity(&normalized.entity_id).ok_or_else(|| {
            fail(
                ErrorCode::UnknownEntity,
                format!("unknown entity: {}", normalized.entity_id),
            )
        })?;

        let normalized = apply_setpoint_step(normalized, desc.half_degree_setpoint);

        let frames = self
            .encoder
            .encode(&normalized, desc, None)
            .map_err(|err| fail(err.code(), err.to_string()))?;

        self.transmitter
            .send_sequence(&frames)
            .await
            .map_err(|err| fail(err.code(), err.to_string()))?;

        Ok(CommandAck {
            entity_id: normalized.entity_id,
            family: normalized.family,
            action: normalized.action,
            value: normalized.value.to_json(),
            latency_ms: received_at.elapsed().as_millis() as u64,
        })
    }

    /// Dequeue and process candidate commands in FIFO order until the
    /// channel closes.
    pub async fn run(&self, mut commands: mpsc::Receiver<CandidateCommand>) {
        while let Some(cmd) = commands.recv().await {
            self.execute(cmd).await;
        }
        tracing::debug!("command channel closed, egress pipeline stopping");
    }
}

/// Half-degree thermostats expect the setpoint biased up by half a
/// degree; the codec itself never rounds.
fn apply_setpoint_step(mut cmd: NormalizedCommand, half_degree: bool) -> NormalizedCommand {
    if half_degree {
        if let CommandValue::Temperature(f) = cmd.value {
            cmd.value = CommandValue::Temperature(f + 0.5);
        }
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::ports::TransportError;
    use crate::services::validator::CommandPolicy;
    use rvcbridge_domain::command::Family;
    use rvcbridge_domain::entity::MappingDocument;
    use rvcbridge_domain::frame::CanId;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::watch;

    #[derive(Default)]
    struct FakeTransport {
        written: Mutex<Vec<(u32, [u8; 8])>>,
        failing: AtomicBool,
    }

    impl CanTransport for FakeTransport {
        fn write_frame(
            &self,
            can_id: CanId,
            payload: &[u8; 8],
        ) -> impl Future<Output = Result<(), TransportError>> + Send {
            let result = if self.failing.load(Ordering::SeqCst) {
                Err("bus unreachable".into())
            } else {
                self.written
                    .lock()
                    .unwrap()
                    .push((can_id.raw(), *payload));
                Ok(())
            };
            async move { result }
        }
    }

    fn index() -> Arc<EntityIndex> {
        let doc: MappingDocument = toml::from_str(
            r#"
            [[entities]]
            entity_id = "light_ceiling"
            kind = "light"
            source_message = "DC_DIMMER_STATUS_3"
            instance = 1
            signal_field = "load_status"
            device_id = "lighting"
            supports_brightness = true

            [[entities]]
            entity_id = "hvac_front"
            kind = "climate"
            source_message = "THERMOSTAT_STATUS_1"
            instance = 0
            device_id = "hvac"
            "#,
        )
        .unwrap();
        Arc::new(EntityIndex::from_document(doc).unwrap())
    }

    struct Fixture {
        pipeline: CommandPipeline<Arc<FakeTransport>, Arc<InProcessEventBus>>,
        transport: Arc<FakeTransport>,
        events: tokio::sync::broadcast::Receiver<BridgeEvent>,
        _shutdown: watch::Sender<bool>,
    }

    fn fixture() -> Fixture {
        let index = index();
        let transport = Arc::new(FakeTransport::default());
        let bus = Arc::new(InProcessEventBus::new(32));
        let events = bus.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let pipeline = CommandPipeline::new(
            Arc::clone(&index),
            CommandValidator::new(Arc::clone(&index), CommandPolicy::default()),
            RateLimiter::new(10, 2, Duration::from_millis(500)),
            CommandEncoder::new(99),
            FrameTransmitter::new(
                Arc::clone(&transport),
                3,
                Duration::from_millis(1),
                shutdown_rx,
            ),
            bus,
        );

        Fixture {
            pipeline,
            transport,
            events,
            _shutdown: shutdown_tx,
        }
    }

    fn light_on() -> CandidateCommand {
        CandidateCommand {
            entity_id: "light_ceiling".to_string(),
            family: Some(Family::Light),
            action: None,
            value: Some(serde_json::json!("ON")),
        }
    }

    #[tokio::test]
    async fn should_transmit_and_acknowledge_valid_command() {
        let mut fx = fixture();

        fx.pipeline.execute(light_on()).await;

        let BridgeEvent::Ack(ack) = fx.events.recv().await.unwrap() else {
            panic!("expected an ack");
        };
        assert_eq!(ack.entity_id, "light_ceiling");
        assert_eq!(ack.value, serde_json::json!("ON"));

        let written = fx.transport.written.lock().unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(written[0].0, 0x19FE_DB63);
    }

    #[tokio::test]
    async fn should_publish_failure_and_no_frames_for_out_of_range_value() {
        let mut fx = fixture();

        fx.pipeline
            .execute(CandidateCommand {
                entity_id: "light_ceiling".to_string(),
                family: Some(Family::Light),
                action: Some(rvcbridge_domain::command::CommandAction::Brightness),
                value: Some(serde_json::json!(150)),
            })
            .await;

        let BridgeEvent::Failure(failure) = fx.events.recv().await.unwrap() else {
            panic!("expected a failure");
        };
        assert_eq!(failure.code, ErrorCode::AboveMaximum);
        assert!(fx.transport.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_reject_second_command_in_cooldown_window() {
        let mut fx = fixture();

        fx.pipeline.execute(light_on()).await;
        fx.pipeline.execute(light_on()).await;

        assert!(matches!(
            fx.events.recv().await.unwrap(),
            BridgeEvent::Ack(_)
        ));
        let BridgeEvent::Failure(failure) = fx.events.recv().await.unwrap() else {
            panic!("expected a failure");
        };
        assert_eq!(failure.code, ErrorCode::CooldownActive);

        // Only the first command reached the bus.
        assert_eq!(fx.transport.written.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn should_surface_transmit_failure_as_e101() {
        let mut fx = fixture();
        fx.transport.failing.store(true, Ordering::SeqCst);

        fx.pipeline.execute(light_on()).await;

        let BridgeEvent::Failure(failure) = fx.events.recv().await.unwrap() else {
            panic!("expected a failure");
        };
        assert_eq!(failure.code, ErrorCode::TransmitFailed);
        assert_eq!(fx.pipeline.tx_stats().frames_failed, 1);
    }

    #[tokio::test]
    async fn should_surface_missing_rvc_mapping_as_e100() {
        let doc: MappingDocument = toml::from_str(
            r#"
            [[entities]]
            entity_id = "hvac_rear"
            kind = "climate"
            source_message = "THERMOSTAT_STATUS_1"
            device_id = "hvac"
            "#,
        )
        .unwrap();
        let index = Arc::new(EntityIndex::from_document(doc).unwrap());
        let transport = Arc::new(FakeTransport::default());
        let bus = Arc::new(InProcessEventBus::new(8));
        let mut events = bus.subscribe();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let pipeline = CommandPipeline::new(
            Arc::clone(&index),
            CommandValidator::new(Arc::clone(&index), CommandPolicy::default()),
            RateLimiter::new(10, 2, Duration::ZERO),
            CommandEncoder::new(99),
            FrameTransmitter::new(
                Arc::clone(&transport),
                1,
                Duration::from_millis(1),
                shutdown_rx,
            ),
            bus,
        );

        pipeline
            .execute(CandidateCommand {
                entity_id: "hvac_rear".to_string(),
                family: Some(Family::Climate),
                action: Some(rvcbridge_domain::command::CommandAction::Temperature),
                value: Some(serde_json::json!(72)),
            })
            .await;

        let BridgeEvent::Failure(failure) = events.recv().await.unwrap() else {
            panic!("expected a failure");
        };
        assert_eq!(failure.code, ErrorCode::NoRvcMapping);
        assert!(transport.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_bias_setpoint_for_half_degree_thermostats() {
        let doc: MappingDocument = toml::from_str(
            r#"
            [[entities]]
            entity_id = "hvac_front"
            kind = "climate"
            source_message = "THERMOSTAT_STATUS_1"
            instance = 1
            device_id = "hvac"
            half_degree_setpoint = true
            "#,
        )
        .unwrap();
        let index = Arc::new(EntityIndex::from_document(doc).unwrap());
        let transport = Arc::new(FakeTransport::default());
        let bus = Arc::new(InProcessEventBus::new(8));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let pipeline = CommandPipeline::new(
            Arc::clone(&index),
            CommandValidator::new(Arc::clone(&index), CommandPolicy::default()),
            RateLimiter::new(10, 2, Duration::ZERO),
            CommandEncoder::new(99),
            FrameTransmitter::new(
                Arc::clone(&transport),
                1,
                Duration::from_millis(1),
                shutdown_rx,
            ),
            bus,
        );

        pipeline
            .execute(CandidateCommand {
                entity_id: "hvac_front".to_string(),
                family: Some(Family::Climate),
                action: Some(rvcbridge_domain::command::CommandAction::Temperature),
                value: Some(serde_json::json!(72)),
            })
            .await;

        // 72.5 °F → raw 9456 = 0x24F0 little-endian F0 24.
        let written = transport.written.lock().unwrap();
        assert_eq!(written[0].1[3], 0xF0);
        assert_eq!(written[0].1[4], 0x24);
    }

    #[tokio::test]
    async fn should_process_queue_in_fifo_order() {
        let fx = fixture();
        let (tx, rx) = mpsc::channel(8);

        tx.send(light_on()).await.unwrap();
        tx.send(CandidateCommand {
            entity_id: "hvac_front".to_string(),
            family: Some(Family::Climate),
            action: Some(rvcbridge_domain::command::CommandAction::Mode),
            value: Some(serde_json::json!("cool")),
        })
        .await
        .unwrap();
        drop(tx);

        fx.pipeline.run(rx).await;

        let written = fx.transport.written.lock().unwrap();
        // Three dimmer frames, then the thermostat mode frame.
        assert_eq!(written.len(), 4);
        assert_eq!(written[3].0, 0x19FE_F963);
        assert_eq!(written[3].1[1], 0xC1);
    }
}
