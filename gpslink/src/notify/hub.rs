//! In-process broadcast hub.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

use super::{NotificationEvent, NotificationHub, PublishError};

/// Buffered events per channel before slow receivers start lagging.
const CHANNEL_CAPACITY: usize = 16;

/// Broadcast-channel implementation of [`NotificationHub`].
///
/// Each named channel is a `tokio::sync::broadcast` sender; subscribers
/// hold receivers. A lagging receiver skips old events rather than
/// blocking the publisher - there is no delivery guarantee.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    channels: Mutex<HashMap<String, broadcast::Sender<NotificationEvent>>>,
}

impl BroadcastHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a channel, receiving all future notifications on it.
    pub fn subscribe(
        &self,
        name: &str,
    ) -> Result<broadcast::Receiver<NotificationEvent>, PublishError> {
        let channels = self.channels.lock().unwrap();
        channels
            .get(name)
            .map(|tx| tx.subscribe())
            .ok_or_else(|| PublishError::UnknownChannel(name.to_string()))
    }

    /// Number of live receivers on a channel (0 for unknown channels).
    pub fn subscriber_count(&self, name: &str) -> usize {
        let channels = self.channels.lock().unwrap();
        channels.get(name).map_or(0, |tx| tx.receiver_count())
    }

    /// Number of channels currently registered.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }
}

impl NotificationHub for BroadcastHub {
    fn create_channel(&self, name: &str) {
        let mut channels = self.channels.lock().unwrap();
        channels.entry(name.to_string()).or_insert_with(|| {
            debug!(channel = name, "Created notification channel");
            broadcast::channel(CHANNEL_CAPACITY).0
        });
    }

    fn remove_channel(&self, name: &str) {
        let mut channels = self.channels.lock().unwrap();
        if channels.remove(name).is_some() {
            debug!(channel = name, "Removed notification channel");
        }
    }

    fn publish(&self, name: &str, payload: &serde_json::Value) -> Result<(), PublishError> {
        // Clone the sender out so the send happens outside the map lock
        let tx = {
            let channels = self.channels.lock().unwrap();
            let tx = channels
                .get(name)
                .ok_or_else(|| PublishError::UnknownChannel(name.to_string()))?;

            if tx.receiver_count() == 0 {
                return Err(PublishError::NoSubscriber(name.to_string()));
            }
            tx.clone()
        };

        tx.send(NotificationEvent {
            channel: name.to_string(),
            payload: payload.clone(),
        })
        .map(|_| ())
        .map_err(|_| PublishError::NoSubscriber(name.to_string()))
    }
}
