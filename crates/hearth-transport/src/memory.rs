//! In-process transport for tests and local tooling.
//!
//! [`MemoryConnector::new`] returns a connector and a [`MemoryListener`].
//! Every `connect()` stays pending until the listener accepts (or refuses)
//! it, which lets a test hold the client in its connecting phase for as
//! long as it likes. The accepted [`MemoryPeer`] plays the remote service.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Notify, mpsc, oneshot};

use crate::{Connection, ConnectionId, Connector, TransportError};

/// A connect request waiting for the listener.
struct PendingConnect {
    peer: MemoryPeer,
    accepted: oneshot::Sender<()>,
}

/// Client side: opens [`MemoryConnection`]s towards a [`MemoryListener`].
#[derive(Clone)]
pub struct MemoryConnector {
    requests: mpsc::UnboundedSender<PendingConnect>,
}

impl MemoryConnector {
    /// Creates a connector and the listener that serves it.
    pub fn new() -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { requests: tx }, MemoryListener { requests: rx })
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(
        &self,
        endpoint: &str,
    ) -> Result<MemoryConnection, TransportError> {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let (accepted_tx, accepted_rx) = oneshot::channel();

        let refused = || TransportError::ConnectFailed {
            endpoint: endpoint.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "memory listener refused the connection",
            ),
        };

        let pending = PendingConnect {
            peer: MemoryPeer {
                endpoint: endpoint.to_string(),
                to_client,
                from_client,
            },
            accepted: accepted_tx,
        };
        self.requests.send(pending).map_err(|_| refused())?;
        accepted_rx.await.map_err(|_| refused())?;

        Ok(MemoryConnection {
            id: ConnectionId::next(),
            outbound: Mutex::new(Some(outbound)),
            inbound: Mutex::new(inbound),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        })
    }
}

/// Server side: accepts or refuses incoming memory connections.
pub struct MemoryListener {
    requests: mpsc::UnboundedReceiver<PendingConnect>,
}

impl MemoryListener {
    /// Waits for the next connect attempt and accepts it.
    ///
    /// Returns `None` once every connector has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        loop {
            let pending = self.requests.recv().await?;
            // The client may have given up while waiting.
            if pending.accepted.send(()).is_ok() {
                return Some(pending.peer);
            }
        }
    }

    /// Waits for the next connect attempt and refuses it.
    pub async fn refuse(&mut self) -> bool {
        match self.requests.recv().await {
            Some(pending) => {
                tracing::debug!(endpoint = %pending.peer.endpoint, "refusing memory connection");
                true
            }
            None => false,
        }
    }
}

/// The remote end of a [`MemoryConnection`].
pub struct MemoryPeer {
    endpoint: String,
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    from_client: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryPeer {
    /// The endpoint string the client connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Delivers a frame to the client. Returns `false` if it is gone.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        self.to_client.send(frame).is_ok()
    }

    /// Next frame sent by the client, or `None` once it closed.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.from_client.recv().await
    }

    /// Closes the connection from the remote side.
    pub fn close(self) {}
}

/// Client end of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl Connection for MemoryConnection {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let outbound = self.outbound.lock().await;
        let tx = outbound.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(frame.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer went away".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let closing = self.close_signal.notified();
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            frame = inbound.recv() => Ok(frame),
            _ = closing => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.outbound.lock().await.take();
            self.close_signal.notify_waiters();
        }
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pair() -> (MemoryConnection, MemoryPeer) {
        let (connector, mut listener) = MemoryConnector::new();
        let accept = tokio::spawn(async move { listener.accept().await });
        let conn = connector.connect("mem://svc").await.expect("connect");
        let peer = accept.await.unwrap().expect("accepted");
        (conn, peer)
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (conn, mut peer) = pair().await;
        assert_eq!(peer.endpoint(), "mem://svc");

        conn.send(b"ping").await.unwrap();
        assert_eq!(peer.recv().await, Some(b"ping".to_vec()));

        assert!(peer.send(b"pong".to_vec()));
        assert_eq!(conn.recv().await.unwrap(), Some(b"pong".to_vec()));
    }

    #[tokio::test]
    async fn test_send_after_close_is_not_connected() {
        let (conn, mut peer) = pair().await;
        conn.close().await.unwrap();
        conn.close().await.unwrap(); // idempotent

        let err = conn.send(b"late").await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
        assert_eq!(peer.recv().await, None);
        assert_eq!(conn.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_peer_close_ends_client_recv() {
        let (conn, peer) = pair().await;
        peer.close();
        assert_eq!(conn.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refused_connect_fails() {
        let (connector, mut listener) = MemoryConnector::new();
        let refuse = tokio::spawn(async move { listener.refuse().await });
        let err = connector.connect("mem://svc").await.err().expect("refused");
        assert!(matches!(err, TransportError::ConnectFailed { .. }));
        assert!(refuse.await.unwrap());
    }

    #[tokio::test]
    async fn test_connect_without_listener_fails() {
        let (connector, listener) = MemoryConnector::new();
        drop(listener);
        assert!(connector.connect("mem://svc").await.is_err());
    }
}
