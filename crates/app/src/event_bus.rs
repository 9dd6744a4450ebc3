//! Fan-out of bridge events to however many consumers are listening.
//!
//! The RX and egress pipelines publish here without knowing who reads:
//! today that is the MQTT adapter, but tests subscribe directly and a
//! metrics sink could too. Built on `tokio::sync::broadcast`, so every
//! subscriber sees every event published after it joined.

use std::future::Future;

use tokio::sync::broadcast;

use rvcbridge_domain::event::BridgeEvent;

use crate::ports::EventPublisher;

/// Broadcast-backed implementation of the [`EventPublisher`] port.
///
/// There is no delivery guarantee toward absent consumers: with nobody
/// subscribed, published events vanish, which is the behavior the
/// pipelines want — state retention is the broker glue's job, not ours.
pub struct InProcessEventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl InProcessEventBus {
    /// Create a bus whose per-subscriber backlog holds `capacity`
    /// events; a consumer that falls further behind starts losing the
    /// oldest ones.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Attach a new consumer. Only events published from this point on
    /// are delivered to it.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: BridgeEvent) -> impl Future<Output = ()> + Send {
        // send() errors exactly when no receiver exists; per the port
        // contract that is not a failure, so the result is discarded.
        let _ = self.sender.send(event);
        async {}
    }
}
