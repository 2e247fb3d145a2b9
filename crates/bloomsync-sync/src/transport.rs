//! Transport abstraction for the reconciliation protocol.
//!
//! The transport carries frames between exactly two peers. Implementations
//! may use WebSockets, HTTP, or any other channel; the session treats every
//! call as a suspension point and never assumes it returns immediately.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::SyncMessage;

/// Point-to-point message transport.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a message to the peer.
    async fn send(&self, message: SyncMessage) -> Result<()>;

    /// Receive the next message from the peer.
    ///
    /// Blocks until a message is available or an error occurs.
    async fn recv(&self) -> Result<SyncMessage>;

    /// Receive with timeout.
    ///
    /// Returns None if timeout expires before a message arrives.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<SyncMessage>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn send(&self, message: SyncMessage) -> Result<()> {
        (**self).send(message).await
    }

    async fn recv(&self) -> Result<SyncMessage> {
        (**self).recv().await
    }

    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<SyncMessage>> {
        (**self).recv_timeout(timeout).await
    }
}

/// An in-memory transport for tests and in-process peers.
///
/// Frames are CBOR-encoded on send and decoded on receive, so the same
/// codec path runs as over a real wire.
pub mod memory {
    use super::*;
    use bytes::Bytes;
    use tokio::sync::{mpsc, Mutex};

    use crate::error::SyncError;

    /// Default channel capacity per direction.
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// One end of an in-memory connection.
    pub struct MemoryTransport {
        sender: mpsc::Sender<Bytes>,
        receiver: Mutex<mpsc::Receiver<Bytes>>,
    }

    impl MemoryTransport {
        /// Create two connected endpoints.
        pub fn pair() -> (MemoryTransport, MemoryTransport) {
            Self::pair_with_capacity(DEFAULT_CAPACITY)
        }

        /// Create two connected endpoints with a bounded buffer per direction.
        pub fn pair_with_capacity(capacity: usize) -> (MemoryTransport, MemoryTransport) {
            let (tx_a, rx_a) = mpsc::channel(capacity);
            let (tx_b, rx_b) = mpsc::channel(capacity);
            (
                MemoryTransport {
                    sender: tx_a,
                    receiver: Mutex::new(rx_b),
                },
                MemoryTransport {
                    sender: tx_b,
                    receiver: Mutex::new(rx_a),
                },
            )
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, message: SyncMessage) -> Result<()> {
            let frame = message.encode()?;
            self.sender
                .send(frame)
                .await
                .map_err(|_| SyncError::TransportError("peer disconnected".into()))
        }

        async fn recv(&self) -> Result<SyncMessage> {
            let mut rx = self.receiver.lock().await;
            match rx.recv().await {
                Some(frame) => SyncMessage::decode(&frame),
                None => Err(SyncError::TransportError("channel closed".into())),
            }
        }
    }
}
