//! Connection management for client connections.
//!
//! This module handles the lifecycle of a single client connection: its
//! identity, its outbound queue and the read and write loops that move
//! frames between the transport and the rest of the gateway.

pub mod client;
pub mod io;
pub mod queue;

pub use client::{Connection, DisconnectReason};
pub use queue::OutboundQueue;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of connection identifiers for the whole process.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of a connection.
///
/// Identifiers are unique for the lifetime of the process and are never
/// handed out twice, even after the connection they named has closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next unused identifier.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_connection_ids_are_never_reused() {
        let ids: HashSet<ConnectionId> = (0..1000).map(|_| ConnectionId::next()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_connection_ids_increase() {
        let first = ConnectionId::next();
        let second = ConnectionId::next();
        assert!(second > first);
        assert_ne!(first.to_string(), second.to_string());
    }
}
