//! The gateway: admission of connections and ownership of the registry.
//!
//! A [`Gateway`] is a cheap handle onto one running event loop. Cloning it
//! shares the same registry and intake channels.

mod event_loop;
mod registry;

pub use registry::Registry;

use crate::{
    config::GatewayConfig,
    connection::{io, Connection, ConnectionId},
    error::{EnvelopeError, GatewayError},
    messaging::{Envelope, MessageHandler},
    services::Services,
};
use event_loop::Registration;
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

/// Handle to a running gateway.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    registry: Registry,
    register: mpsc::UnboundedSender<Registration>,
    unregister: mpsc::UnboundedSender<ConnectionId>,
    handler: Arc<dyn MessageHandler>,
    services: Services,
}

impl Gateway {
    /// Spawns the event loop and returns a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `config` - Admission limit and per-connection transport settings
    /// * `handler` - Invoked for every envelope any connection sends
    /// * `services` - Collaborators reachable from every connection
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use summoner_gateway::{Gateway, GatewayConfig, NoopHandler, Services};
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let gateway = Gateway::start(GatewayConfig::default(), Arc::new(NoopHandler), Services::default());
    /// assert_eq!(gateway.connection_count().await, 0);
    /// # }
    /// ```
    pub fn start(config: GatewayConfig, handler: Arc<dyn MessageHandler>, services: Services) -> Self {
        let registry = Registry::new();
        let (register, register_rx) = mpsc::unbounded_channel();
        let (unregister, unregister_rx) = mpsc::unbounded_channel();

        tokio::spawn(event_loop::run(
            registry.clone(),
            config.max_connections,
            register_rx,
            unregister_rx,
        ));

        Self {
            config: Arc::new(config),
            registry,
            register,
            unregister,
            handler,
            services,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Turns an upgraded WebSocket into a live, registered connection.
    ///
    /// Registration is acknowledged by the event loop before the read and
    /// write loops start, so the connection is visible to [`broadcast`]
    /// before it can receive or send anything.
    ///
    /// # Arguments
    ///
    /// * `ws_stream` - A WebSocket that has completed its handshake
    /// * `remote_addr` - The peer's address, kept for logging
    ///
    /// # Returns
    ///
    /// The registered connection. A full gateway closes the socket with code
    /// 1013 and returns [`GatewayError::CapacityReached`];
    /// [`GatewayError::Internal`] means the event loop has stopped.
    ///
    /// [`broadcast`]: Gateway::broadcast
    pub async fn admit<S>(
        &self,
        mut ws_stream: WebSocketStream<S>,
        remote_addr: SocketAddr,
    ) -> Result<Arc<Connection>, GatewayError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (connection, outbound) = Connection::new(
            ConnectionId::next(),
            remote_addr,
            &self.config,
            self.unregister.clone(),
            self.services.clone(),
        );

        let (ack, ack_rx) = oneshot::channel();
        self.register
            .send(Registration { connection: connection.clone(), ack })
            .map_err(|_| GatewayError::Internal("gateway event loop is not running".to_string()))?;
        let accepted = ack_rx
            .await
            .map_err(|_| GatewayError::Internal("gateway event loop dropped a registration".to_string()))?;

        if !accepted {
            let frame = CloseFrame {
                code: CloseCode::Again,
                reason: "connection limit reached".into(),
            };
            if let Err(e) = ws_stream.close(Some(frame)).await {
                debug!("Close frame to refused peer {} failed: {}", remote_addr, e);
            }
            return Err(GatewayError::CapacityReached(self.config.max_connections));
        }

        let (sink, stream) = ws_stream.split();
        let (reader_done, reader_done_rx) = oneshot::channel();
        let (writer_done, writer_done_rx) = oneshot::channel();

        tokio::spawn(io::write_loop(
            connection.id(),
            sink,
            outbound,
            reader_done_rx,
            writer_done,
            self.config.keepalive_interval(),
            self.config.write_timeout(),
        ));
        tokio::spawn(io::read_loop(
            connection.clone(),
            stream,
            self.handler.clone(),
            reader_done,
            writer_done_rx,
        ));

        info!("🤝 Connection {} admitted from {}", connection.id(), remote_addr);
        Ok(connection)
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.registry.ids().await
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.registry.contains(id).await
    }

    pub async fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.registry.get(id).await
    }

    /// Queues `envelope` on every registered connection.
    ///
    /// Returns the number of connections that accepted the message. A
    /// connection whose queue is full is handled by its backpressure policy
    /// and does not hold up the others.
    pub async fn broadcast(&self, envelope: &Envelope) -> Result<usize, EnvelopeError> {
        let text = envelope.encode()?;
        let mut delivered = 0;
        for connection in self.registry.snapshot().await {
            if connection.enqueue(text.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        debug!("📢 Broadcast {} event to {} connection(s)", envelope.event, delivered);
        Ok(delivered)
    }

    /// Asks every registered connection to shut down cleanly.
    ///
    /// Each write loop sends a close frame after draining what is already
    /// queued; the connections then unregister themselves.
    pub async fn close_all(&self) -> usize {
        let mut closed = 0;
        for connection in self.registry.snapshot().await {
            if connection.close_outbound().await {
                closed += 1;
            }
        }
        if closed > 0 {
            warn!("🛑 Closing {} live connection(s)", closed);
        }
        closed
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}
