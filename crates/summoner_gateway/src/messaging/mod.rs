//! Message handling for client-server communication.
//!
//! This module provides the envelope vocabulary spoken on the wire and the
//! hook through which decoded envelopes reach application code.

pub mod handler;
pub mod types;

pub use handler::{MessageHandler, NoopHandler};
pub use types::{Envelope, GameEvent};
