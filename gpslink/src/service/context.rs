//! Shared service state.
//!
//! One [`ServiceContext`] per service instance owns everything the three
//! execution contexts (connection manager, poller, evaluation loop) and
//! the client-facing operations share. It is passed around as an `Arc` -
//! there are no process-wide singletons.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::fix::FixStore;
use crate::subscription::SubscriptionRegistry;

/// Daemon connection lifecycle state.
///
/// Written only by the connection manager; readable by anyone for status
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// Between attempts, waiting out the backoff delay.
    Connecting {
        /// Failed attempts so far in this cycle.
        attempt: u32,
        /// Delay before the next attempt.
        next_delay: Duration,
    },
    /// Link up, poller and evaluation loop running.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting { attempt, .. } => write!(f, "Connecting (attempt {})", attempt),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// State shared by all execution contexts of one service instance.
///
/// The fix store and the registry each carry their own lock so the fast
/// poll path never contends with the slower evaluation path. The
/// `connected` flag is the only cross-loop control signal: the poller
/// clears it when the link dies and both loops observe it at their loop
/// top.
#[derive(Debug, Default)]
pub struct ServiceContext {
    /// Latest-fix slot (poller writes, everyone reads).
    pub fix_store: FixStore,

    /// Active subscriptions.
    pub registry: SubscriptionRegistry,

    connected: AtomicBool,
    connection_state: Mutex<ConnectionState>,
}

impl ServiceContext {
    /// Create a fresh context with no fix, no subscriptions, disconnected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the daemon link is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Set the daemon link flag.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Current connection lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.connection_state.lock().unwrap()
    }

    /// Record a connection lifecycle transition.
    pub fn set_connection_state(&self, state: ConnectionState) {
        *self.connection_state.lock().unwrap() = state;
    }
}
