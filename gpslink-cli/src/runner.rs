//! CLI runner for common setup.
//!
//! Encapsulates logging initialization and startup reporting so `main`
//! stays focused on argument wiring.

use gpslink::logging::{default_log_dir, default_log_file, init_logging_full, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle.
pub struct CliRunner {
    /// Logging guard - keeps logging active while the runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
}

impl CliRunner {
    /// Initialize logging and create the runner.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - When true, enables debug-level logging regardless
    ///   of RUST_LOG
    pub fn with_debug(debug_mode: bool) -> Result<Self, CliError> {
        let logging_guard = init_logging_full(
            default_log_dir(),
            default_log_file(),
            true,
            debug_mode,
        )
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self { logging_guard })
    }

    /// Log startup information.
    pub fn log_startup(&self, daemon_addr: &str) {
        info!("GPSLink v{}", gpslink::VERSION);
        info!(addr = daemon_addr, "Target gpsd");
    }
}
