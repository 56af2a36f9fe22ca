//! Notification publishing seam.
//!
//! The evaluation loop does not talk to subscribers directly; it publishes
//! into named channels through the [`NotificationHub`] trait. The in-process
//! implementation is [`BroadcastHub`], built on `tokio::sync::broadcast`.
//! A host shell that forwards notifications elsewhere (IPC, message bus)
//! implements the same trait.
//!
//! Delivery is lossy by design: a publish into a channel nobody is
//! listening on reports [`PublishError::NoSubscriber`], which is an
//! expected steady-state outcome and feeds idle eviction, not an error log.

mod hub;

pub use hub::BroadcastHub;

use serde_json::Value;

/// One notification as seen by a subscriber.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// Canonical channel name the notification was published on.
    pub channel: String,

    /// Marshalled fix payload.
    pub payload: Value,
}

/// Error type for channel operations.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The channel exists but nobody is currently listening.
    #[error("no current subscriber on channel '{0}'")]
    NoSubscriber(String),

    /// The channel was never created (or has been removed).
    #[error("unknown notification channel '{0}'")]
    UnknownChannel(String),
}

/// Named-channel publish interface consumed by the evaluation loop.
pub trait NotificationHub: Send + Sync {
    /// Create a channel. Creating an existing channel is a no-op.
    fn create_channel(&self, name: &str);

    /// Remove a channel, disconnecting any remaining receivers.
    fn remove_channel(&self, name: &str);

    /// Publish a payload into a channel.
    fn publish(&self, name: &str, payload: &Value) -> Result<(), PublishError>;
}
