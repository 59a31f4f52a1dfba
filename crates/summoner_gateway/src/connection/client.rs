//! Client connection representation.
//!
//! A [`Connection`] is shared between its read loop, the gateway registry
//! and any message handler that wants to reply. Only the write loop touches
//! the outgoing half of the transport; everyone else talks to it through the
//! outbound queue.

use super::{queue::OutboundQueue, ConnectionId};
use crate::{
    config::GatewayConfig,
    error::{EnqueueError, SendError},
    messaging::{Envelope, GameEvent},
    services::Services,
};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{
    self,
    protocol::{frame::coding::CloseCode, CloseFrame},
};
use tracing::{debug, warn};

/// Represents an individual client connection to the gateway.
pub struct Connection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    connected_at: SystemTime,

    /// Set by whatever external code vouches for the peer's identity
    authenticated: AtomicBool,

    outbound: OutboundQueue,

    /// Intake of the owning gateway; holding it does not keep the registry alive
    unregister: mpsc::UnboundedSender<ConnectionId>,

    services: Services,
}

impl Connection {
    /// Creates a connection together with the receiving end of its outbound
    /// queue, which belongs to the write loop.
    pub(crate) fn new(
        id: ConnectionId,
        remote_addr: SocketAddr,
        config: &GatewayConfig,
        unregister: mpsc::UnboundedSender<ConnectionId>,
        services: Services,
    ) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (outbound, receiver) =
            OutboundQueue::new(config.outbound_capacity, config.backpressure);
        let connection = Arc::new(Self {
            id,
            remote_addr,
            connected_at: SystemTime::now(),
            authenticated: AtomicBool::new(false),
            outbound,
            unregister,
            services,
        });
        (connection, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn connected_at(&self) -> SystemTime {
        self.connected_at
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::Release);
    }

    /// Collaborators available to handlers serving this connection.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Encodes an envelope and queues it for the write loop.
    pub async fn send(&self, event: GameEvent, payload: serde_json::Value) -> Result<(), SendError> {
        let text = Envelope::new(event, payload).encode()?;
        self.enqueue(text).await?;
        Ok(())
    }

    /// Queues an already encoded message for the write loop.
    ///
    /// Never blocks on a slow peer: a full queue is handled by the configured
    /// backpressure policy, which by default closes the queue and with it the
    /// connection.
    pub async fn enqueue(&self, text: String) -> Result<(), EnqueueError> {
        let result = self.outbound.push(text).await;
        match result {
            Err(EnqueueError::Overflow) | Err(EnqueueError::TimedOut) => {
                warn!("🐌 Connection {} cannot keep up, closing outbound queue", self.id);
            }
            Err(EnqueueError::Dropped) => {
                debug!("Connection {} outbound queue full, message dropped", self.id);
            }
            _ => {}
        }
        result
    }

    /// Closes the outbound queue, asking the write loop to finish cleanly.
    pub async fn close_outbound(&self) -> bool {
        self.outbound.close().await
    }

    pub async fn is_outbound_closed(&self) -> bool {
        self.outbound.is_closed().await
    }

    /// Hands this connection to the gateway's unregister intake.
    pub(crate) fn request_unregister(&self) {
        if self.unregister.send(self.id).is_err() {
            debug!("Gateway intake closed before connection {} unregistered", self.id);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

/// Why a connection's read loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer sent a normal or going-away close frame
    ClientClosed,
    /// The transport dropped without a closing handshake
    Abnormal,
    /// The peer sent a frame larger than the configured cap
    Capacity,
    /// Our side ended the session (write failure, queue closed)
    ServerClosed,
    /// Any other close code or transport error
    Unexpected(String),
}

impl DisconnectReason {
    /// Classifies a close frame received from the peer.
    pub fn from_close_frame(frame: Option<&CloseFrame>) -> Self {
        match frame.map(|frame| frame.code) {
            None | Some(CloseCode::Normal) | Some(CloseCode::Away) => DisconnectReason::ClientClosed,
            Some(CloseCode::Abnormal) => DisconnectReason::Abnormal,
            Some(code) => {
                let reason = frame.map(|frame| frame.reason.as_str()).unwrap_or_default();
                DisconnectReason::Unexpected(format!("close code {}: {}", u16::from(code), reason))
            }
        }
    }

    /// Classifies a transport read error.
    pub fn from_error(error: &tungstenite::Error) -> Self {
        use tungstenite::error::ProtocolError;

        match error {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                DisconnectReason::ClientClosed
            }
            tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                DisconnectReason::Abnormal
            }
            tungstenite::Error::Capacity(_) => DisconnectReason::Capacity,
            other => DisconnectReason::Unexpected(other.to_string()),
        }
    }

    /// Whether this close deserves attention in the logs.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, DisconnectReason::Unexpected(_) | DisconnectReason::Capacity)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ClientClosed => f.write_str("client closed"),
            DisconnectReason::Abnormal => f.write_str("abnormal closure"),
            DisconnectReason::Capacity => f.write_str("frame too large"),
            DisconnectReason::ServerClosed => f.write_str("server closed"),
            DisconnectReason::Unexpected(detail) => write!(f, "unexpected: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_connection(config: &GatewayConfig) -> (Arc<Connection>, mpsc::Receiver<String>, mpsc::UnboundedReceiver<ConnectionId>) {
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (connection, outbound) = Connection::new(
            ConnectionId::next(),
            "127.0.0.1:40000".parse().unwrap(),
            config,
            unregister_tx,
            Services::default(),
        );
        (connection, outbound, unregister_rx)
    }

    #[tokio::test]
    async fn test_send_encodes_envelope() {
        let (connection, mut outbound, _unregister) = test_connection(&GatewayConfig::default());

        connection.send(GameEvent::PlayerJoin, json!({"name": "ayla"})).await.unwrap();

        let text = outbound.recv().await.unwrap();
        let envelope = Envelope::decode(&text).unwrap();
        assert_eq!(envelope.event, GameEvent::PlayerJoin);
        assert_eq!(envelope.payload["name"], "ayla");
    }

    #[tokio::test]
    async fn test_full_queue_closes_connection_queue() {
        let (connection, _outbound, _unregister) = test_connection(&GatewayConfig::default());

        for _ in 0..256 {
            connection.enqueue("{}".to_string()).await.unwrap();
        }
        assert_eq!(connection.enqueue("{}".to_string()).await, Err(EnqueueError::Overflow));
        assert!(connection.is_outbound_closed().await);
    }

    #[tokio::test]
    async fn test_request_unregister_sends_own_id() {
        let (connection, _outbound, mut unregister) = test_connection(&GatewayConfig::default());

        connection.request_unregister();
        assert_eq!(unregister.recv().await, Some(connection.id()));
    }

    #[test]
    fn test_authenticated_flag() {
        let (connection, _outbound, _unregister) = test_connection(&GatewayConfig::default());
        assert!(!connection.is_authenticated());
        connection.set_authenticated(true);
        assert!(connection.is_authenticated());
    }

    #[test]
    fn test_close_frame_classification() {
        let frame = |code| CloseFrame { code, reason: "bye".into() };

        assert_eq!(DisconnectReason::from_close_frame(None), DisconnectReason::ClientClosed);
        assert_eq!(
            DisconnectReason::from_close_frame(Some(&frame(CloseCode::Away))),
            DisconnectReason::ClientClosed
        );
        assert_eq!(
            DisconnectReason::from_close_frame(Some(&frame(CloseCode::Abnormal))),
            DisconnectReason::Abnormal
        );

        let unexpected = DisconnectReason::from_close_frame(Some(&frame(CloseCode::Policy)));
        assert!(unexpected.is_unexpected());
        assert!(unexpected.to_string().contains("1008"));
    }

    #[test]
    fn test_error_classification() {
        use tungstenite::error::ProtocolError;

        assert_eq!(
            DisconnectReason::from_error(&tungstenite::Error::ConnectionClosed),
            DisconnectReason::ClientClosed
        );
        assert_eq!(
            DisconnectReason::from_error(&tungstenite::Error::Protocol(
                ProtocolError::ResetWithoutClosingHandshake
            )),
            DisconnectReason::Abnormal
        );
        assert!(!DisconnectReason::Abnormal.is_unexpected());
    }
}
