//! Per-socket upgrade handling.

use crate::{config::GatewayConfig, connection::Connection, error::GatewayError, gateway::Gateway};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{accept_async_with_config, tungstenite::protocol::WebSocketConfig};
use tracing::{debug, warn};

/// Protocol settings applied to every upgraded socket.
///
/// Inbound messages and frames are both capped at the configured frame size;
/// a larger frame ends the connection.
pub fn websocket_config(config: &GatewayConfig) -> WebSocketConfig {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_frame_size);
    ws_config.max_frame_size = Some(config.max_frame_size);
    ws_config
}

/// Upgrades one accepted socket and admits it to `gateway`.
///
/// # Connection Flow
///
/// 1. Perform the WebSocket handshake with the frame cap applied
/// 2. Register the connection and wait for the gateway to acknowledge it
/// 3. Start the read and write loops
///
/// # Arguments
///
/// * `stream` - The accepted transport, usually a `TcpStream`
/// * `addr` - The remote address of the client
/// * `gateway` - The gateway the connection joins
///
/// # Returns
///
/// The admitted [`Connection`], or [`GatewayError::Handshake`] if the upgrade
/// failed (nothing is admitted and the socket is dropped), or
/// [`GatewayError::CapacityReached`] if the gateway is full.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    gateway: Gateway,
) -> Result<Arc<Connection>, GatewayError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    debug!("🔌 Upgrading connection from {}", addr);

    let ws_stream = accept_async_with_config(stream, Some(websocket_config(gateway.config())))
        .await
        .map_err(|e| {
            warn!("❌ WebSocket handshake with {} failed: {}", addr, e);
            GatewayError::Handshake(e.to_string())
        })?;

    gateway.admit(ws_stream, addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{messaging::NoopHandler, services::Services};
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_websocket_config_caps_frames() {
        let config = GatewayConfig {
            max_frame_size: 1024,
            ..GatewayConfig::default()
        };
        let ws_config = websocket_config(&config);
        assert_eq!(ws_config.max_frame_size, Some(1024));
        assert_eq!(ws_config.max_message_size, Some(1024));
    }

    #[tokio::test]
    async fn test_failed_handshake_admits_nothing() {
        let gateway = Gateway::start(GatewayConfig::default(), Arc::new(NoopHandler), Services::default());
        let (server_io, mut client_io) = tokio::io::duplex(4096);

        client_io.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

        let result = handle_connection(server_io, "127.0.0.1:50100".parse().unwrap(), gateway.clone()).await;
        assert!(matches!(result, Err(GatewayError::Handshake(_))));
        assert_eq!(gateway.connection_count().await, 0);
    }
}
