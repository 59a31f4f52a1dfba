//! TCP accept loop and WebSocket upgrade.
//!
//! This module contains the server that listens for raw TCP connections,
//! upgrades them to WebSockets and hands them to the [`Gateway`](crate::Gateway).

pub mod core;
pub mod handlers;

pub use self::core::GatewayServer;
pub use handlers::{handle_connection, websocket_config};
