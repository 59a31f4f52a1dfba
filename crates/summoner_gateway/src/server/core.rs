//! Core gateway server implementation.
//!
//! This module contains the `GatewayServer` struct, which binds the listening
//! socket and feeds accepted connections to a [`Gateway`].

use crate::{
    config::GatewayConfig,
    error::GatewayError,
    gateway::Gateway,
    messaging::MessageHandler,
    server::handlers::handle_connection,
    services::Services,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// The TCP front of a gateway.
///
/// `GatewayServer` owns the accept loop. Every accepted socket is upgraded
/// and admitted on its own task, so a slow handshake never delays the next
/// accept.
pub struct GatewayServer {
    gateway: Gateway,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
    shutdown_requested: AtomicBool,
}

impl GatewayServer {
    /// Creates a server and starts its gateway event loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: GatewayConfig, handler: Arc<dyn MessageHandler>, services: Services) -> Self {
        let (shutdown_sender, _) = broadcast::channel(1);
        Self {
            gateway: Gateway::start(config, handler, services),
            shutdown_sender,
            shutdown_requested: AtomicBool::new(false),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Binds the configured address and serves until [`shutdown`] is called.
    ///
    /// # Startup Sequence
    ///
    /// 1. Bind a `TcpListener` on `bind_address`
    /// 2. Accept sockets, upgrading each one on its own task
    /// 3. On shutdown, stop accepting and send every live connection a close frame
    ///
    /// # Returns
    ///
    /// `Ok(())` after a requested shutdown, or [`GatewayError::Network`] if
    /// the address could not be bound.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use summoner_gateway::create_server;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let server = create_server();
    /// server.start().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// [`shutdown`]: GatewayServer::shutdown
    pub async fn start(&self) -> Result<(), GatewayError> {
        let bind_address = self.gateway.config().bind_address;
        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|e| GatewayError::Network(format!("Failed to bind {bind_address}: {e}")))?;

        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Network(format!("Listener has no local address: {e}")))?;
        info!("🚀 Gateway listening on ws://{}", local_addr);

        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        while !self.shutdown_requested.load(Ordering::Acquire) {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => {
                        // Usually resource exhaustion (EMFILE); keep accepting.
                        error!("Failed to accept connection: {}", e);
                    }
                },
                _ = shutdown_receiver.recv() => {
                    info!("🛑 Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        self.gateway.close_all().await;
        info!("✅ Gateway server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }

        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            match handle_connection(stream, addr, gateway).await {
                Ok(_) => {}
                // Already logged by the handshake itself.
                Err(GatewayError::Handshake(_)) => {}
                Err(e) => debug!("Connection from {} not admitted: {}", addr, e),
            }
        });
    }

    /// Stops the accept loop. Live connections are sent a close frame.
    pub fn shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_sender.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::NoopHandler;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_stops_accept_loop() {
        let config = GatewayConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            ..GatewayConfig::default()
        };
        let server = Arc::new(GatewayServer::new(config, Arc::new(NoopHandler), Services::default()));

        let running = {
            let server = server.clone();
            tokio::spawn(async move { server.start().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(2), running).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bind_failure_is_network_error() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = GatewayConfig {
            bind_address: occupied.local_addr().unwrap(),
            ..GatewayConfig::default()
        };
        let server = GatewayServer::new(config, Arc::new(NoopHandler), Services::default());

        assert!(matches!(server.start().await, Err(GatewayError::Network(_))));
    }
}
