//! Logging system setup and configuration.
//!
//! This module initializes the tracing-based logging system with either
//! human-readable or JSON output.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set. JSON
/// output is used when either the file or the CLI asks for it.
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> anyhow::Result<()> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Logs the startup banner.
pub fn display_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🔮 SUMMONER GATEWAY           ║");
    info!("║                 v{:<24}║", version);
    info!("║                                          ║");
    info!("║  Real-time WebSocket connection hub      ║");
    info!("╚══════════════════════════════════════════╝");
}
