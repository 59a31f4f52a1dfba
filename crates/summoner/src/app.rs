//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that wires configuration,
//! the gateway server and signal handling into one running process.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, setup_signal_handlers_silent},
};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use summoner_gateway::{GatewayServer, MemoryCache, NoopHandler, Services};
use tokio::time::{interval_at, Instant};
use tracing::{error, info, warn};

/// Period of the health log line.
const HEALTH_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for the accept loop to stop.
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(8);

/// How long shutdown waits for live connections to finish closing.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Main application struct.
///
/// The `Application` owns the validated configuration and the gateway server
/// and drives them from startup through graceful shutdown.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Gateway server instance
    server: Arc<GatewayServer>,
    /// Process-local cache handed to handlers; swept by the health task
    cache: Arc<MemoryCache>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Create the gateway server
    pub async fn new(args: CliArgs) -> anyhow::Result<Self> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let gateway_config = config.to_gateway_config()?;
        let cache = Arc::new(MemoryCache::new());
        let services = Services::new().with_cache(cache.clone());
        let server = Arc::new(GatewayServer::new(gateway_config, Arc::new(NoopHandler), services));

        Ok(Self { config, server, cache })
    }

    /// Runs the gateway until a shutdown signal arrives or the server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("🌟 Starting Summoner Gateway");
        self.log_configuration_summary();

        let mut server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move { server.start().await })
        };

        let monitoring_handle = {
            let server = self.server.clone();
            let cache = self.cache.clone();

            tokio::spawn(async move {
                let mut interval = interval_at(Instant::now() + HEALTH_INTERVAL, HEALTH_INTERVAL);
                loop {
                    interval.tick().await;

                    let connections = server.gateway().connection_count().await;
                    let purged = cache.purge_expired().await;
                    info!(
                        "📊 System Health - {} live connection(s) | {} expired cache entr(ies) purged",
                        connections, purged
                    );
                }
            })
        };

        info!("🔍 Health monitoring active - stats every {}s", HEALTH_INTERVAL.as_secs());
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        tokio::select! {
            finished = &mut server_handle => {
                monitoring_handle.abort();
                // The server only returns on its own when it could not start.
                finished
                    .context("Server task panicked")?
                    .context("Gateway server stopped unexpectedly")?;
                return Ok(());
            }
            signal = setup_signal_handlers() => {
                signal.context("Failed to listen for shutdown signals")?;
            }
        }

        // A second signal skips the graceful path.
        tokio::spawn(async {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        monitoring_handle.abort();

        info!("🧹 Stopping accept loop and closing connections...");
        self.server.shutdown();
        match tokio::time::timeout(SERVER_STOP_TIMEOUT, server_handle).await {
            Ok(Ok(Ok(()))) => info!("✅ Server task completed gracefully"),
            Ok(Ok(Err(e))) => error!("❌ Server error during shutdown: {}", e),
            Ok(Err(e)) => error!("❌ Server task failed: {}", e),
            Err(_) => warn!("⏰ Server task did not complete within timeout, proceeding with cleanup"),
        }

        info!("⏳ Waiting for connections to close...");
        let gateway = self.server.gateway();
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while gateway.connection_count().await > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let remaining = gateway.connection_count().await;
        if remaining > 0 {
            warn!("⏰ {} connection(s) still open at exit", remaining);
        }

        info!("✅ Summoner Gateway shutdown complete");
        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        let gateway = &self.config.gateway;
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!("  📬 Outbound queue: {} messages ({:?})", gateway.outbound_capacity, gateway.backpressure);
        info!("  📏 Max frame size: {} bytes", gateway.max_frame_size);
        info!(
            "  ⏱️ Keepalive: {}s | Write timeout: {}s",
            gateway.keepalive_interval_secs, gateway.write_timeout_secs
        );
    }
}
