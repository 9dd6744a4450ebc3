//! # rvcbridge-adapter-slcan
//!
//! SLCAN-over-TCP adapter — connects to a network-attached SLCAN
//! interface, feeds received frames into the RX pipeline, and implements
//! the [`CanTransport`] write port.
//!
//! ## How it works
//!
//! The interface speaks the textual SLCAN protocol over a single TCP
//! byte stream: `\r`-terminated lines, extended data frames prefixed
//! with `T`. On connect the adapter replays the channel-open handshake
//! (close, 250 kbit/s, open), then reads lines until the peer goes
//! silent or the socket drops, at which point it reconnects after a
//! configurable delay. Writes are serialized behind one async mutex —
//! interleaving bytes from two frames would corrupt the stream.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `rvcbridge-app` and
//! `rvcbridge-domain`.

pub mod codec;
mod config;
mod error;

pub use config::SlcanConfig;
pub use error::{SlcanError, SlcanParseError};

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};

use rvcbridge_app::ports::{CanTransport, TransportError};
use rvcbridge_domain::frame::{CanId, RawFrame};

/// Channel-open handshake: close, 250 kbit/s, open.
const HANDSHAKE: &[u8] = b"C\rS5\rO\r";

/// The SLCAN TCP client. One instance owns both directions: the receive
/// loop ([`run`](Self::run)) and the [`CanTransport`] write port.
pub struct SlcanClient {
    config: SlcanConfig,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl SlcanClient {
    /// Create a client; no connection is attempted until
    /// [`run`](Self::run) is started.
    #[must_use]
    pub fn new(config: SlcanConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
        }
    }

    /// Connect, read frames and reconnect forever, until shutdown turns
    /// true or the frame channel closes.
    ///
    /// While disconnected the writer is cleared, so concurrent
    /// [`write_frame`](CanTransport::write_frame) calls fail fast instead
    /// of queueing onto a dead socket.
    pub async fn run(&self, frames: mpsc::Sender<RawFrame>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let stream = match TcpStream::connect(self.config.addr()).await {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(
                        addr = %self.config.addr(),
                        error = %err,
                        "SLCAN connect failed, retrying"
                    );
                    if wait_or_shutdown(
                        Duration::from_secs(u64::from(self.config.reconnect_delay_secs)),
                        &mut shutdown,
                    )
                    .await
                    {
                        break;
                    }
                    continue;
                }
            };

            let (mut reader, mut writer) = stream.into_split();
            if let Err(err) = writer.write_all(HANDSHAKE).await {
                tracing::warn!(error = %err, "SLCAN handshake failed, retrying");
                if wait_or_shutdown(
                    Duration::from_secs(u64::from(self.config.reconnect_delay_secs)),
                    &mut shutdown,
                )
                .await
                {
                    break;
                }
                continue;
            }
            *self.writer.lock().await = Some(writer);
            tracing::info!(addr = %self.config.addr(), "connected to the SLCAN interface");

            let disconnect =
                self.read_loop(&mut reader, &frames, &mut shutdown).await;
            *self.writer.lock().await = None;

            match disconnect {
                Disconnect::Shutdown => break,
                Disconnect::ChannelClosed => break,
                Disconnect::Idle => {
                    tracing::warn!("no SLCAN traffic, reconnecting");
                }
                Disconnect::Io(err) => {
                    tracing::warn!(error = %err, "SLCAN connection lost, reconnecting");
                    if wait_or_shutdown(
                        Duration::from_secs(u64::from(self.config.reconnect_delay_secs)),
                        &mut shutdown,
                    )
                    .await
                    {
                        break;
                    }
                }
            }
        }
        tracing::info!("SLCAN client stopped");
    }

    async fn read_loop(
        &self,
        reader: &mut tokio::net::tcp::OwnedReadHalf,
        frames: &mpsc::Sender<RawFrame>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Disconnect {
        let idle = Duration::from_secs(u64::from(self.config.read_idle_timeout_secs));
        let mut buffer = Vec::with_capacity(4096);
        let mut chunk = [0u8; 1024];

        loop {
            let read = tokio::select! {
                read = tokio::time::timeout(idle, reader.read(&mut chunk)) => read,
                _ = shutdown.wait_for(|stop| *stop) => return Disconnect::Shutdown,
            };

            let n = match read {
                Err(_) => return Disconnect::Idle,
                Ok(Err(err)) => return Disconnect::Io(err),
                Ok(Ok(0)) => {
                    return Disconnect::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    ));
                }
                Ok(Ok(n)) => n,
            };

            buffer.extend_from_slice(&chunk[..n]);
            while let Some(end) = buffer.iter().position(|&b| b == b'\r') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                let line = String::from_utf8_lossy(&line[..line.len() - 1]);
                match codec::parse_line(line.trim_matches(|c| c == '\n' || c == '\r')) {
                    Ok(Some(frame)) => {
                        if frames.send(frame).await.is_err() {
                            return Disconnect::ChannelClosed;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::debug!(line = %line, error = %err, "unparseable SLCAN line");
                    }
                }
            }
        }
    }
}

enum Disconnect {
    Shutdown,
    ChannelClosed,
    Idle,
    Io(std::io::Error),
}

impl CanTransport for SlcanClient {
    fn write_frame(
        &self,
        can_id: CanId,
        payload: &[u8; 8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let line = codec::format_frame(can_id, payload);
        async move {
            let mut guard = self.writer.lock().await;
            let writer = guard.as_mut().ok_or(SlcanError::NotConnected)?;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    // A failed write means the stream is gone; drop the
                    // half so the next caller fails fast while the read
                    // loop reconnects.
                    *guard = None;
                    Err(SlcanError::Io(err).into())
                }
            }
        }
    }
}

/// Sleep for `delay`, returning early (true) when shutdown turns true.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => false,
        _ = shutdown.wait_for(|stop| *stop) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn client_with_listener() -> (SlcanClient, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = SlcanConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            reconnect_delay_secs: 1,
            read_idle_timeout_secs: 5,
        };
        (SlcanClient::new(config), listener)
    }

    #[tokio::test]
    async fn should_fail_write_when_not_connected() {
        let client = SlcanClient::new(SlcanConfig::default());
        let result = client
            .write_frame(CanId::from_parts(6, 0x1FEDB, 99), &[0u8; 8])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn should_handshake_and_deliver_received_frames() {
        let (client, listener) = client_with_listener().await;
        let (frames_tx, mut frames_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let client = std::sync::Arc::new(client);
        let runner = {
            let client = std::sync::Arc::clone(&client);
            tokio::spawn(async move { client.run(frames_tx, shutdown_rx).await })
        };

        let (mut peer, _) = listener.accept().await.unwrap();

        // The client opens the channel first.
        let mut handshake = [0u8; HANDSHAKE.len()];
        peer.read_exact(&mut handshake).await.unwrap();
        assert_eq!(&handshake, HANDSHAKE);

        // Feed one tank status frame, split across two writes.
        peer.write_all(b"T19FFB700800030400FF").await.unwrap();
        peer.write_all(b"FFFFFF\r").await.unwrap();

        let frame = frames_rx.recv().await.unwrap();
        assert_eq!(frame.can_id.raw(), 0x19FF_B700);
        assert_eq!(frame.data.len(), 8);
        assert_eq!(frame.data[1], 0x03);

        // An outbound frame reaches the peer as one line.
        client
            .write_frame(
                CanId::from_parts(6, 0x1FEDB, 99),
                &[0x01, 0xFF, 0xC8, 0x00, 0xFF, 0x00, 0xFF, 0xFF],
            )
            .await
            .unwrap();
        let mut line = [0u8; 27];
        peer.read_exact(&mut line).await.unwrap();
        assert_eq!(&line, b"T19FEDB63801FFC800FF00FFFF\r");

        shutdown_tx.send(true).unwrap();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn should_stop_when_frame_channel_closes() {
        let (client, listener) = client_with_listener().await;
        let (frames_tx, frames_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let runner = tokio::spawn(async move { client.run(frames_tx, shutdown_rx).await });

        let (mut peer, _) = listener.accept().await.unwrap();
        let mut handshake = [0u8; HANDSHAKE.len()];
        peer.read_exact(&mut handshake).await.unwrap();

        drop(frames_rx);
        peer.write_all(b"T19FFB7000\r").await.unwrap();

        runner.await.unwrap();
    }
}
