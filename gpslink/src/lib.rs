//! GPSLink - Resilient GNSS fix distribution for gpsd hosts
//!
//! This library keeps a long-lived connection to a gpsd daemon alive across
//! daemon restarts, stores the most recent position fix, and lets consumers
//! register condition-triggered notifications (periodic, movement-threshold,
//! speed-threshold) without polling.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use gpslink::service::{GpsService, ServiceConfig};
//!
//! let service = GpsService::new(ServiceConfig::from_env());
//! service.start();
//!
//! // Query the latest fix
//! let fix = service.latest_fix()?;
//!
//! // Stream notifications at 10Hz
//! let mut rx = service.subscribe("gps_data", "frequency", 10)?;
//! while let Ok(event) = rx.recv().await {
//!     println!("{}", event.payload);
//! }
//! ```

pub mod evaluator;
pub mod fix;
pub mod geo;
pub mod gpsd;
pub mod logging;
pub mod notify;
pub mod service;
pub mod subscription;

/// Version of the GPSLink library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
