//! Factory functions for gateway servers.

use crate::{config::GatewayConfig, messaging::NoopHandler, server::GatewayServer, services::Services};
use std::sync::Arc;

/// Creates a gateway server with default configuration and no message logic.
///
/// Useful for smoke tests and for exercising the transport on its own.
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() {
/// use summoner_gateway::create_server;
///
/// let server = create_server();
/// assert_eq!(server.gateway().config().max_connections, 1000);
/// # }
/// ```
pub fn create_server() -> GatewayServer {
    create_server_with_config(GatewayConfig::default())
}

/// Creates a gateway server with custom configuration and no message logic.
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() {
/// use summoner_gateway::{create_server_with_config, GatewayConfig};
///
/// let config = GatewayConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 5000,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config);
/// # }
/// ```
pub fn create_server_with_config(config: GatewayConfig) -> GatewayServer {
    GatewayServer::new(config, Arc::new(NoopHandler), Services::default())
}
