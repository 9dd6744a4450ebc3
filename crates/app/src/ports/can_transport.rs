//! CAN transport port — write access to the bus.

use std::future::Future;

use rvcbridge_domain::frame::CanId;

/// Opaque transport failure returned by adapters. The transmitter wraps
/// it with the failing frame index and retries around it.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Writes single frames onto the CAN bus.
///
/// Implementations live in adapter crates (e.g. the SLCAN TCP client).
/// The underlying medium is a single shared byte stream, so adapters must
/// serialize concurrent writes internally; callers only guarantee they
/// never interleave frames of one sequence.
pub trait CanTransport {
    /// Write one extended frame with an 8-byte payload.
    fn write_frame(
        &self,
        can_id: CanId,
        payload: &[u8; 8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: CanTransport + Send + Sync> CanTransport for std::sync::Arc<T> {
    fn write_frame(
        &self,
        can_id: CanId,
        payload: &[u8; 8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).write_frame(can_id, payload)
    }
}
