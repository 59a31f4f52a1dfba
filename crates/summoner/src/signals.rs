//! Signal handling for graceful server shutdown.
//!
//! Listens for SIGINT and SIGTERM on Unix and Ctrl+C on Windows.

use tokio::signal;
use tracing::info;

/// Waits for a termination signal and logs its arrival.
///
/// # Platform Support
///
/// * **Unix platforms**: Handles SIGINT and SIGTERM signals
/// * **Windows**: Handles Ctrl+C signal
///
/// # Returns
///
/// `Ok(())` once a signal arrives, or an error if the signal listeners
/// could not be installed.
///
/// # Example
///
/// ```rust,ignore
/// // Start the server...
/// setup_signal_handlers().await?;
/// // ...then shut it down.
/// ```
pub async fn setup_signal_handlers() -> std::io::Result<()> {
    setup_signal_handlers_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}

/// Waits for a termination signal without logging.
pub async fn setup_signal_handlers_silent() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
