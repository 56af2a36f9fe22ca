//! High-level service facade for embedding hosts.
//!
//! This module provides a simplified API that encapsulates all component
//! wiring and configuration, following the Facade pattern.
//!
//! # Example
//!
//! ```ignore
//! use gpslink::service::{GpsService, ServiceConfig};
//!
//! let service = GpsService::new(ServiceConfig::from_env());
//! service.start();
//!
//! let mut rx = service.subscribe("gps_data", "movement", 100)?;
//! while let Ok(event) = rx.recv().await {
//!     println!("moved: {}", event.payload);
//! }
//! ```

pub mod config;
pub mod context;
mod error;
mod facade;

pub use config::ServiceConfig;
pub use context::{ConnectionState, ServiceContext};
pub use error::ServiceError;
pub use facade::{GpsService, GPS_DATA_KIND};
