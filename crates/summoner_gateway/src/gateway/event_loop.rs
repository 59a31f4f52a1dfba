//! The single task that owns registry membership.
//!
//! Register and unregister requests arrive on two intake channels and are
//! applied one at a time. Pending registrations always win over pending
//! unregistrations, so a connection is never removed before it was added.

use super::registry::Registry;
use crate::connection::{Connection, ConnectionId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// A request to add a connection to the registry.
///
/// `ack` receives `true` once the connection is registered, or `false` if
/// the gateway is full.
pub(crate) struct Registration {
    pub connection: Arc<Connection>,
    pub ack: oneshot::Sender<bool>,
}

/// Applies membership changes until every intake sender is gone.
pub(crate) async fn run(
    registry: Registry,
    max_connections: usize,
    mut register: mpsc::UnboundedReceiver<Registration>,
    mut unregister: mpsc::UnboundedReceiver<ConnectionId>,
) {
    debug!("🔁 Gateway event loop started");

    loop {
        // Registrations go first so an unregister never overtakes the
        // register it follows. The cost: a steady burst of admissions can
        // hold back pending unregistrations until the burst drains.
        tokio::select! {
            biased;

            Some(registration) = register.recv() => {
                on_register(&registry, max_connections, registration).await;
            }
            Some(id) = unregister.recv() => {
                on_unregister(&registry, id).await;
            }
            else => break,
        }
    }

    debug!("🔁 Gateway event loop stopped");
}

async fn on_register(registry: &Registry, max_connections: usize, registration: Registration) {
    let Registration { connection, ack } = registration;
    let id = connection.id();

    if registry.contains(id).await {
        let _ = ack.send(true);
        return;
    }

    if registry.len().await >= max_connections {
        warn!("🚫 Refusing connection {}: limit of {} reached", id, max_connections);
        let _ = ack.send(false);
        return;
    }

    registry.insert(connection).await;
    if ack.send(true).is_err() {
        // The admitting task went away; its loops will never run.
        registry.remove(id).await;
        debug!("Connection {} abandoned during admission", id);
        return;
    }

    info!("🔗 Connection {} registered ({} live)", id, registry.len().await);
}

async fn on_unregister(registry: &Registry, id: ConnectionId) {
    let Some(connection) = registry.remove(id).await else {
        return;
    };

    connection.close_outbound().await;
    info!("👋 Connection {} unregistered ({} live)", id, registry.len().await);
}
