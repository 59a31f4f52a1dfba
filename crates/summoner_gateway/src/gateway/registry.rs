//! The set of live connections.

use crate::connection::{Connection, ConnectionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared view of the connections currently registered with a gateway.
///
/// Every clone refers to the same set. Only the gateway event loop calls the
/// mutating methods; everything else reads. The lock is never held across
/// network I/O.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    connections: Arc<RwLock<HashMap<ConnectionId, Arc<Connection>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `connection` unless its id is already present.
    /// Returns `true` if the connection was added.
    pub(crate) async fn insert(&self, connection: Arc<Connection>) -> bool {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&connection.id()) {
            return false;
        }
        connections.insert(connection.id(), connection);
        true
    }

    pub(crate) async fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    pub async fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.read().await.get(&id).cloned()
    }

    pub async fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Clones the current membership so callers can do I/O without the lock.
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }
}
