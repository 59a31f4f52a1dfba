//! Gateway configuration types and defaults.
//!
//! This module contains the gateway configuration structure and the default
//! values used for connection limits, frame sizes and timing.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Capacity of each connection's outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Largest inbound frame accepted from a peer, in bytes.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512;

/// Period between keepalive pings on an otherwise idle connection.
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 54;

/// Deadline applied to every transport write.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;

/// What happens when a message is enqueued onto a full outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Close the queue immediately; the slow consumer is disconnected.
    CloseOnFull,
    /// Discard the new message and keep the connection.
    DropNewest,
    /// Wait up to the given number of milliseconds for capacity, then close.
    BlockWithTimeout(u64),
}

impl Default for BackpressurePolicy {
    fn default() -> Self {
        BackpressurePolicy::CloseOnFull
    }
}

/// Configuration structure for the gateway.
///
/// Contains the listening address, the admission limit and the per-connection
/// transport settings shared by every read and write loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Capacity of each connection's outbound queue, in messages
    pub outbound_capacity: usize,

    /// Maximum inbound frame size in bytes
    pub max_frame_size: usize,

    /// Keepalive ping period in seconds
    pub keepalive_interval_secs: u64,

    /// Deadline for each transport write in seconds
    pub write_timeout_secs: u64,

    /// Policy applied when the outbound queue is full
    pub backpressure: BackpressurePolicy,
}

impl GatewayConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1000,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            keepalive_interval_secs: DEFAULT_KEEPALIVE_INTERVAL_SECS,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            backpressure: BackpressurePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_transport_constants() {
        let config = GatewayConfig::default();
        assert_eq!(config.outbound_capacity, 256);
        assert_eq!(config.max_frame_size, 512);
        assert_eq!(config.keepalive_interval(), Duration::from_secs(54));
        assert_eq!(config.write_timeout(), Duration::from_secs(10));
        assert_eq!(config.backpressure, BackpressurePolicy::CloseOnFull);
    }

    #[test]
    fn test_backpressure_policy_serde_names() {
        let json = serde_json::to_string(&BackpressurePolicy::DropNewest).unwrap();
        assert_eq!(json, "\"drop_newest\"");

        let policy: BackpressurePolicy =
            serde_json::from_str(r#"{"block_with_timeout":250}"#).unwrap();
        assert_eq!(policy, BackpressurePolicy::BlockWithTimeout(250));
    }
}
