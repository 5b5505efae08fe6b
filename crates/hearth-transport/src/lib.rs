//! Transport abstraction layer for Hearth.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! the link between the launcher and the remote service, plus
//! [`pump_events`], the receive loop that turns a connection into a
//! stream of [`TransportEvent`]s, and [`write_frames`], its sending
//! counterpart.
//!
//! Reconnection policy does not live here. A closed connection is reported
//! once as [`TransportEvent::Closed`] and it is up to the session layer to
//! decide what happens next.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket client via `tokio-tungstenite`

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open and ready to carry frames.
    Opened,
    /// The connection is gone. [`pump_events`] emits it exactly once;
    /// [`write_frames`] also emits it when a write fails.
    Closed(String),
    /// One inbound frame, as received.
    FrameReceived(Vec<u8>),
}

/// Opens outgoing connections to a remote endpoint.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Opens a connection to `endpoint`.
    ///
    /// Resolves once the connection is usable; no retries are attempted.
    fn connect(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single full-duplex connection carrying opaque frames.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the remote peer.
    ///
    /// Fails with [`TransportError::NotConnected`] once the connection
    /// has been closed locally.
    fn send(
        &self,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection. Calling it again is a no-op.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

/// Drives the receive side of `conn`, forwarding everything to `events`.
///
/// Emits one [`TransportEvent::FrameReceived`] per inbound frame and then
/// exactly one [`TransportEvent::Closed`]. Returns early if the receiving
/// end of `events` has been dropped.
pub async fn pump_events<C: Connection>(
    conn: Arc<C>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let id = conn.id();
    let reason = loop {
        match conn.recv().await {
            Ok(Some(frame)) => {
                if events.send(TransportEvent::FrameReceived(frame)).is_err() {
                    tracing::trace!(%id, "event receiver dropped, stopping pump");
                    return;
                }
            }
            Ok(None) => break "closed by peer".to_string(),
            Err(e) => break e.to_string(),
        }
    };
    tracing::debug!(%id, %reason, "connection closed");
    let _ = events.send(TransportEvent::Closed(reason));
}

/// Drives the send side of `conn`, writing queued frames in order.
///
/// Returns once the `frames` queue is closed and drained. A failed write
/// is reported as [`TransportEvent::Closed`] on `events` and stops the
/// writer; frames still queued are dropped.
pub async fn write_frames<C: Connection>(
    conn: Arc<C>,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let id = conn.id();
    while let Some(frame) = frames.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(%id, error = %e, "write failed");
            let _ = events.send(TransportEvent::Closed(e.to_string()));
            return;
        }
    }
    tracing::trace!(%id, "frame queue closed, writer done");
}
