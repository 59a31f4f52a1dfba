//! Pluggable handling of decoded client messages.
//!
//! The read loop awaits [`MessageHandler::handle`] inline for every decoded
//! envelope, so implementations must return promptly. Anything long-running
//! belongs in a spawned task; replies go through [`Connection::send`].

use crate::{connection::Connection, error::HandlerError, messaging::Envelope};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

/// Application logic invoked for every envelope a client sends.
///
/// An `Err` is logged by the read loop and otherwise ignored; it never
/// closes the connection.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, connection: &Arc<Connection>, envelope: Envelope) -> Result<(), HandlerError>;
}

/// Handler that accepts every message and does nothing with it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

#[async_trait]
impl MessageHandler for NoopHandler {
    async fn handle(&self, connection: &Arc<Connection>, envelope: Envelope) -> Result<(), HandlerError> {
        trace!(
            "📭 Unhandled {} event from connection {}: {}",
            envelope.event,
            connection.id(),
            envelope.payload
        );
        Ok(())
    }
}

