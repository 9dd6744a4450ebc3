//! Event bus port — publish state and feedback events.

use std::future::Future;

use rvcbridge_domain::event::BridgeEvent;

/// Publishes bridge events to interested subscribers.
///
/// Publishing is infallible: an event with no active subscriber is simply
/// dropped, and retention semantics belong to the broker-side glue.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: BridgeEvent) -> impl Future<Output = ()> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: BridgeEvent) -> impl Future<Output = ()> + Send {
        (**self).publish(event)
    }
}
