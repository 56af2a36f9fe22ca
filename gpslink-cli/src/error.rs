//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use gpslink::service::ServiceError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Failed to register a subscription
    Subscribe(ServiceError),
    /// Service terminated with an error
    Service(ServiceError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Service(ServiceError::RetriesExhausted(_)) => {
                eprintln!();
                eprintln!("Could not reach gpsd. Make sure:");
                eprintln!("  1. gpsd is running: systemctl status gpsd");
                eprintln!("  2. The endpoint is right (GPSD_HOST/GPSD_PORT or --host/--port)");
                eprintln!("  3. gpsd listens on TCP: gpsd -N -D2 <device>");
            }
            CliError::Subscribe(ServiceError::UnsupportedValue { kind, .. }) => {
                eprintln!();
                eprintln!(
                    "Supported {} values: {:?}",
                    kind,
                    kind.allowed_values()
                );
            }
            _ => {}
        }

        process::exit(1);
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            Self::Subscribe(e) => write!(f, "Subscription failed: {}", e),
            Self::Service(e) => write!(f, "Service error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Subscribe(e) | Self::Service(e) => Some(e),
            Self::LoggingInit(_) => None,
        }
    }
}
