//! Error types and handling for the gateway.
//!
//! Errors are split by blast radius: [`EnvelopeError`] and [`HandlerError`]
//! stay inside a single message, [`EnqueueError`] and [`SendError`] describe
//! what happened to one outbound message, and [`GatewayError`] covers
//! admission and server level failures.

/// Enumeration of possible gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// The WebSocket upgrade failed; nothing was admitted
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    /// The registry already holds the configured maximum of connections
    #[error("Connection limit of {0} reached")]
    CapacityReached(usize),

    /// Internal errors such as a stopped gateway event loop
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure to decode or encode an [`Envelope`](crate::Envelope).
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The frame was not a valid envelope
    #[error("Invalid envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// The event code is not part of the protocol
    #[error("unknown event code {0}")]
    UnknownEvent(u8),
}

/// Outcome of an enqueue attempt that did not put the message on the wire queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    /// The outbound queue was already closed
    #[error("outbound queue is closed")]
    Closed,

    /// The queue was full and has been closed as a result
    #[error("outbound queue overflowed and was closed")]
    Overflow,

    /// The queue was full and this message was discarded
    #[error("outbound queue is full, message dropped")]
    Dropped,

    /// No capacity became available in time and the queue was closed
    #[error("timed out waiting for outbound capacity, queue closed")]
    TimedOut,
}

/// Failure to deliver an envelope to a connection's outbound queue.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Enqueue(#[from] EnqueueError),
}

/// Error returned by a collaborator behind [`Services`](crate::Services).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The collaborator is not configured for this gateway
    #[error("Service unavailable: {0}")]
    Unavailable(&'static str),

    /// The collaborator failed
    #[error("Service error: {0}")]
    Backend(String),
}

/// Error returned by a [`MessageHandler`](crate::MessageHandler).
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The payload did not have the shape the handler expected
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// A reply could not be delivered
    #[error(transparent)]
    Send(#[from] SendError),

    /// A collaborator call failed
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Any other handler-specific failure
    #[error("Handler error: {0}")]
    Other(String),
}
