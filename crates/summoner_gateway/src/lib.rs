//! # Summoner Gateway - Real-Time Connection Substrate
//!
//! A WebSocket gateway that accepts many concurrent client connections,
//! tracks their lifecycle in a single registry and moves structured messages
//! between each client and the application code behind it.
//!
//! ## Design Philosophy
//!
//! The gateway contains **NO game logic** - it only provides transport:
//!
//! * **Connection management** - One read loop and one write loop per client
//! * **Registry ownership** - Membership changes flow through one event loop
//! * **Message envelopes** - A closed vocabulary of event codes with open payloads
//! * **Pluggable handling** - Application code is injected as a [`MessageHandler`]
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Connection** - Owns a bounded outbound queue and the two transport loops
//! * **Gateway** - Admits connections and owns the registry event loop
//! * **GatewayServer** - TCP accept loop performing the WebSocket upgrade
//! * **Services** - Optional identity store and cache reachable from handlers
//!
//! ### Message Flow
//!
//! 1. Client sends a text frame holding `{"event": <code>, "payload": ...}`
//! 2. The read loop decodes it; malformed frames are logged and dropped
//! 3. The envelope is handed to the configured [`MessageHandler`]
//! 4. The handler may reply through [`Connection::send`]
//! 5. The write loop flushes queued replies, coalescing bursts into one frame
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use summoner_gateway::{GatewayConfig, GatewayServer, NoopHandler, Services};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = GatewayServer::new(GatewayConfig::default(), Arc::new(NoopHandler), Services::default());
//! server.start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Backpressure
//!
//! Enqueueing never blocks on a slow client. By default a full outbound queue
//! is closed, which tears that one connection down cleanly instead of
//! stalling whoever was sending to it. See [`BackpressurePolicy`] for the
//! alternatives.
//!
//! ## Error Handling
//!
//! Per-message failures ([`EnvelopeError`], [`HandlerError`]) never leave the
//! connection they happened on. Per-connection failures always end in the
//! connection unregistering itself. [`GatewayError`] covers admission and
//! server startup.

// Re-export core types and functions for easy access
pub use config::{BackpressurePolicy, GatewayConfig};
pub use connection::{Connection, ConnectionId, DisconnectReason};
pub use error::{EnqueueError, EnvelopeError, GatewayError, HandlerError, SendError, ServiceError};
pub use gateway::{Gateway, Registry};
pub use messaging::{Envelope, GameEvent, MessageHandler, NoopHandler};
pub use server::{handle_connection, GatewayServer};
pub use services::{ExpiringCache, IdentityStore, MemoryCache, Services, UserIdentity};
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod config;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod messaging;
pub mod server;
pub mod services;
pub mod utils;
