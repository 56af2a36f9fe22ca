//! Service error types.
//!
//! Two families share one enum: transient daemon trouble that clients only
//! ever see as "no fix", and request errors surfaced synchronously to the
//! caller. Nothing here aborts the process - the only terminal condition
//! is an exhausted finite retry budget, and that is the caller's decision
//! to make.

use crate::subscription::{RegistryError, SubscriptionKind};

/// Errors surfaced by service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No usable fix is stored (daemon silent, or fix below 2D).
    #[error("no GNSS fix available")]
    NoFix,

    /// Malformed client request (unknown data kind, bad shape).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The condition kind is not one of frequency/movement/max_speed.
    #[error("unsupported condition kind '{0}'")]
    UnsupportedCondition(String),

    /// The threshold is outside the kind's fixed value set.
    #[error("unsupported {kind} value {value}")]
    UnsupportedValue {
        kind: SubscriptionKind,
        value: u32,
    },

    /// The notification channel could not be created or subscribed.
    #[error("subscription channel creation failed: {0}")]
    CreationFailed(String),

    /// Unsubscribe for a condition nobody subscribed to.
    #[error("no active {kind} subscription with value {value}")]
    NotFound {
        kind: SubscriptionKind,
        value: u32,
    },

    /// The finite connection retry budget ran out.
    #[error("gpsd unreachable after {0} connection attempts")]
    RetriesExhausted(u32),

    /// The connection manager task died unexpectedly.
    #[error("connection manager task failed: {0}")]
    TaskFailed(String),

    /// Transport-level I/O failure during connection setup.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RegistryError> for ServiceError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::InvalidThreshold { kind, value, .. } => {
                Self::UnsupportedValue { kind, value }
            }
        }
    }
}
