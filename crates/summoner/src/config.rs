//! Configuration management for the Summoner gateway.
//!
//! This module handles loading, validation, and conversion of the gateway
//! configuration from TOML files and command-line arguments.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use summoner_gateway::config::{
    DEFAULT_KEEPALIVE_INTERVAL_SECS, DEFAULT_MAX_FRAME_SIZE, DEFAULT_OUTBOUND_CAPACITY, DEFAULT_WRITE_TIMEOUT_SECS,
};
use summoner_gateway::{BackpressurePolicy, GatewayConfig};
use tracing::info;

/// Log levels accepted in `[logging] level`.
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener settings
    pub server: ServerSettings,
    /// Per-connection transport settings
    #[serde(default)]
    pub gateway: GatewaySettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Transport settings applied to every connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Outbound queue capacity, in messages
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// Largest inbound frame accepted, in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Seconds between keepalive pings
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    /// Deadline for each transport write, in seconds
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    /// What to do when a client's outbound queue is full
    #[serde(default)]
    pub backpressure: BackpressurePolicy,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

fn default_max_connections() -> usize {
    1000
}

fn default_outbound_capacity() -> usize {
    DEFAULT_OUTBOUND_CAPACITY
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

fn default_keepalive_interval_secs() -> u64 {
    DEFAULT_KEEPALIVE_INTERVAL_SECS
}

fn default_write_timeout_secs() -> u64 {
    DEFAULT_WRITE_TIMEOUT_SECS
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
            max_frame_size: default_max_frame_size(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            backpressure: BackpressurePolicy::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: default_max_connections(),
            },
            gateway: GatewaySettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration file is written at
    /// `path` and the defaults are returned.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("Failed to write default configuration to {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the file settings into the gateway's own configuration.
    pub fn to_gateway_config(&self) -> anyhow::Result<GatewayConfig> {
        let bind_address: SocketAddr = self
            .server
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))?;

        Ok(GatewayConfig {
            bind_address,
            max_connections: self.server.max_connections,
            outbound_capacity: self.gateway.outbound_capacity,
            max_frame_size: self.gateway.max_frame_size,
            keepalive_interval_secs: self.gateway.keepalive_interval_secs,
            write_timeout_secs: self.gateway.write_timeout_secs,
            backpressure: self.gateway.backpressure,
        })
    }

    /// Validates the configuration settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", &self.server.bind_address));
        }

        if self.server.max_connections == 0 {
            return Err("server.max_connections must be greater than 0".to_string());
        }

        if self.gateway.outbound_capacity == 0 {
            return Err("gateway.outbound_capacity must be greater than 0".to_string());
        }

        if self.gateway.max_frame_size == 0 {
            return Err("gateway.max_frame_size must be greater than 0".to_string());
        }

        if self.gateway.keepalive_interval_secs == 0 {
            return Err("gateway.keepalive_interval_secs must be greater than 0".to_string());
        }

        if self.gateway.write_timeout_secs == 0 {
            return Err("gateway.write_timeout_secs must be greater than 0".to_string());
        }

        if self.gateway.write_timeout_secs >= self.gateway.keepalive_interval_secs {
            return Err(format!(
                "gateway.write_timeout_secs ({}) must be shorter than gateway.keepalive_interval_secs ({})",
                self.gateway.write_timeout_secs, self.gateway.keepalive_interval_secs
            ));
        }

        if let BackpressurePolicy::BlockWithTimeout(0) = self.gateway.backpressure {
            return Err("gateway.backpressure block_with_timeout must be greater than 0".to_string());
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LOG_LEVELS:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
