//! # Summoner Gateway - Main Entry Point
//!
//! Runs the real-time WebSocket gateway as a standalone process. This entry
//! point handles CLI parsing, configuration loading, logging setup and the
//! application lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! summoner
//!
//! # Specify custom configuration
//! summoner --config production.toml
//!
//! # Override specific settings
//! summoner --bind 0.0.0.0:8080 --log-level debug
//!
//! # JSON logging for production
//! summoner --json-logs
//! ```
//!
//! ## Configuration
//!
//! The gateway loads configuration from a TOML file (default: `config.toml`)
//! with `[server]`, `[gateway]` and `[logging]` sections. If the file doesn't
//! exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! The first SIGINT (Ctrl+C) or SIGTERM stops accepting connections and
//! closes live ones cleanly. A second signal exits immediately.

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;
use tracing::warn;

// Re-export main types for potential library usage
pub use config::{GatewaySettings, LoggingSettings, ServerSettings};

/// Parses arguments, sets up logging and runs the gateway to completion.
///
/// Returns an error if startup fails or the server stops on its own; the
/// binary turns that into a non-zero exit code.
pub async fn init() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Logging needs its settings before anything else can be reported.
    let (mut logging, load_error) = match AppConfig::load_from_file(&args.config_path).await {
        Ok(config) => (config.logging, None),
        Err(e) => (AppConfig::default().logging, Some(e)),
    };
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }

    logging::setup_logging(&logging, args.json_logs)?;
    if let Some(e) = load_error {
        warn!("⚠️ Using default logging settings: {:#}", e);
    }

    Application::new(args).await?.run().await
}
