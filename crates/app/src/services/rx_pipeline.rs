//! RX pipeline — decode incoming frames against the registry and project
//! entity state onto the publisher.
//!
//! Decoding and projection run synchronously on the RX activity and never
//! block on the bus writer. Per-frame failures are logged and dropped;
//! they never stall the loop.

use std::sync::Arc;

use tokio::sync::mpsc;

use rvcbridge_domain::decode::decode_frame;
use rvcbridge_domain::entity::EntityIndex;
use rvcbridge_domain::error::DecodeError;
use rvcbridge_domain::event::BridgeEvent;
use rvcbridge_domain::frame::RawFrame;
use rvcbridge_domain::project::project;
use rvcbridge_domain::spec::SpecRegistry;

use crate::ports::EventPublisher;

/// The inbound decode → project → publish pipeline.
pub struct RxPipeline<P> {
    registry: Arc<SpecRegistry>,
    index: Arc<EntityIndex>,
    publisher: P,
}

impl<P: EventPublisher> RxPipeline<P> {
    /// Create a pipeline over the loaded registry and entity index.
    #[must_use]
    pub fn new(registry: Arc<SpecRegistry>, index: Arc<EntityIndex>, publisher: P) -> Self {
        Self {
            registry,
            index,
            publisher,
        }
    }

    /// Decode one frame and publish every resulting entity update.
    pub async fn handle_frame(&self, frame: &RawFrame) {
        let message = match decode_frame(&self.registry, frame) {
            Ok(message) => message,
            Err(DecodeError::UnknownDgn { dgn }) => {
                tracing::debug!(dgn = format_args!("{dgn:05X}"), "unknown DGN, frame dropped");
                return;
            }
            Err(err) => {
                tracing::warn!(id = %frame.can_id, error = %err, "invalid frame dropped");
                return;
            }
        };

        for event in project(&self.index, &message) {
            tracing::trace!(
                entity_id = %event.entity_id,
                channel = event.channel.as_str(),
                value = %event.value,
                "entity state update"
            );
            self.publisher.publish(BridgeEvent::State(event)).await;
        }
    }

    /// Consume frames until the channel closes.
    pub async fn run(&self, mut frames: mpsc::Receiver<RawFrame>) {
        while let Some(frame) = frames.recv().await {
            self.handle_frame(&frame).await;
        }
        tracing::debug!("frame channel closed, RX pipeline stopping");
    }
}
