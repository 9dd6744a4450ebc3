//! Frame transmitter — plays a frame sequence onto the bus, observing
//! per-frame pre-delays and retrying transient transport failures.
//!
//! Inter-sequence spacing is not enforced here; the rate limiter owns
//! that concern. A failure on any frame aborts the remainder of the
//! sequence, and frames already on the bus are not retracted.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;

use rvcbridge_domain::encode::FrameSequence;
use rvcbridge_domain::error::ErrorCode;

use crate::ports::{CanTransport, TransportError};

/// A frame sequence that could not be played to completion.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    /// A frame exhausted its retries. `index` counts from zero within
    /// the sequence.
    #[error("frame {index} failed after {attempts} attempts")]
    Frame {
        index: usize,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// Shutdown arrived during a pre-delay; the remaining frames were
    /// abandoned.
    #[error("transmission cancelled before frame {index}")]
    Cancelled { index: usize },
}

impl TxError {
    /// The stable feedback code for transmit failures.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::TransmitFailed
    }
}

/// Transmission statistics, updated atomically with respect to senders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxStats {
    pub frames_sent: u64,
    pub frames_failed: u64,
    pub retries: u64,
    pub last_error: Option<String>,
}

/// Plays [`FrameSequence`]s through a [`CanTransport`].
pub struct FrameTransmitter<T> {
    transport: T,
    retry_count: u32,
    retry_delay: Duration,
    shutdown: watch::Receiver<bool>,
    stats: Mutex<TxStats>,
}

impl<T: CanTransport> FrameTransmitter<T> {
    /// Create a transmitter. `retry_count` is the total number of write
    /// attempts per frame (at least one); `shutdown` cancels pending
    /// pre-delays when it turns true.
    #[must_use]
    pub fn new(
        transport: T,
        retry_count: u32,
        retry_delay: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport,
            retry_count: retry_count.max(1),
            retry_delay,
            shutdown,
            stats: Mutex::new(TxStats::default()),
        }
    }

    /// A snapshot of the transmission statistics.
    #[must_use]
    pub fn stats(&self) -> TxStats {
        self.stats.lock().expect("stats lock poisoned").clone()
    }

    /// Play a sequence in order: wait each frame's pre-delay, then write
    /// it, retrying transport errors.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::Frame`] when a frame exhausts its retries
    /// (the rest of the sequence is abandoned) and [`TxError::Cancelled`]
    /// when shutdown interrupts a pre-delay.
    pub async fn send_sequence(&self, frames: &FrameSequence) -> Result<(), TxError> {
        let mut shutdown = self.shutdown.clone();

        for (index, frame) in frames.iter().enumerate() {
            if frame.pre_delay_ms > 0 {
                let delay = Duration::from_millis(u64::from(frame.pre_delay_ms));
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    _ = shutdown.wait_for(|stop| *stop) => {
                        return Err(TxError::Cancelled { index });
                    }
                }
            }

            self.write_with_retry(index, frame.can_id, &frame.payload)
                .await?;
        }

        Ok(())
    }

    async fn write_with_retry(
        &self,
        index: usize,
        can_id: rvcbridge_domain::frame::CanId,
        payload: &[u8; 8],
    ) -> Result<(), TxError> {
        let mut attempts = 0;
        loop {
            match self.transport.write_frame(can_id, payload).await {
                Ok(()) => {
                    let mut stats = self.stats.lock().expect("stats lock poisoned");
                    stats.frames_sent += 1;
                    return Ok(());
                }
                Err(err) => {
                    attempts += 1;
                    {
                        let mut stats = self.stats.lock().expect("stats lock poisoned");
                        stats.retries += 1;
                    }
                    if attempts >= self.retry_count {
                        let mut stats = self.stats.lock().expect("stats lock poisoned");
                        stats.frames_failed += 1;
                        stats.last_error = Some(err.to_string());
                        return Err(TxError::Frame {
                            index,
                            attempts,
                            source: err,
                        });
                    }
                    tracing::debug!(
                        frame = index,
                        attempt = attempts,
                        error = %err,
                        "frame write failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}
