//! High-level service facade.
//!
//! [`GpsService`] wires the shared context, the broadcast hub, and the
//! connection manager together behind one object the host embeds. Client
//! operations (query, subscribe, unsubscribe) are synchronous and safe to
//! call from any task at any time, including while the poller and the
//! evaluation loop are live.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::config::ServiceConfig;
use super::context::{ConnectionState, ServiceContext};
use super::error::ServiceError;
use crate::fix::payload::fix_payload;
use crate::fix::Fix;
use crate::gpsd::ConnectionManager;
use crate::notify::{BroadcastHub, NotificationEvent, NotificationHub};
use crate::subscription::SubscriptionKind;

/// The only data kind this service publishes.
pub const GPS_DATA_KIND: &str = "gps_data";

/// GNSS fix distribution service.
///
/// # Lifecycle
///
/// [`start`](Self::start) spawns the connection manager as a supervised
/// task whose handle the service retains - the host can [`run`](Self::run)
/// to completion (which only happens on an exhausted retry budget) or
/// [`shutdown`](Self::shutdown) deterministically.
pub struct GpsService {
    config: ServiceConfig,
    ctx: Arc<ServiceContext>,
    hub: Arc<BroadcastHub>,
    manager: Mutex<Option<JoinHandle<Result<(), ServiceError>>>>,
}

impl GpsService {
    /// Create a service; nothing connects until [`start`](Self::start).
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            ctx: Arc::new(ServiceContext::new()),
            hub: Arc::new(BroadcastHub::new()),
            manager: Mutex::new(None),
        }
    }

    /// Spawn the connection manager. Calling twice is a no-op.
    pub fn start(&self) {
        let mut manager = self.manager.lock().unwrap();
        if manager.is_some() {
            warn!("Service already started");
            return;
        }

        info!(
            addr = %self.config.daemon_addr(),
            version = crate::VERSION,
            "Starting GPS service"
        );
        let hub: Arc<dyn NotificationHub> = self.hub.clone();
        let task = ConnectionManager::new(self.config.clone(), self.ctx.clone(), hub);
        *manager = Some(tokio::spawn(task.run()));
    }

    /// Start if needed, then wait for the connection manager.
    ///
    /// Under an unlimited retry budget this only returns if the manager
    /// task dies; with a finite budget it returns `RetriesExhausted` once
    /// the budget is spent.
    pub async fn run(&self) -> Result<(), ServiceError> {
        self.start();
        let handle = self
            .manager
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ServiceError::TaskFailed("run raced with shutdown".to_string()))?;

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(ServiceError::TaskFailed(e.to_string())),
        }
    }

    /// Tear the service down: stop the loops and abort the manager.
    pub async fn shutdown(&self) {
        self.ctx.set_connected(false);
        let handle = self.manager.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        self.ctx.set_connection_state(ConnectionState::Disconnected);
        info!("GPS service stopped");
    }

    /// The latest fix, if one is stored and usable (2D or better).
    pub fn latest_fix(&self) -> Result<Fix, ServiceError> {
        self.ctx.fix_store.valid_snapshot().ok_or(ServiceError::NoFix)
    }

    /// The latest fix marshalled as a client payload.
    pub fn latest_fix_payload(&self) -> Result<serde_json::Value, ServiceError> {
        let fix = self.latest_fix()?;
        fix_payload(&fix, self.config.emit_null_fields).ok_or(ServiceError::NoFix)
    }

    /// Register (or reuse) a condition-triggered subscription and attach
    /// to its notification channel.
    pub fn subscribe(
        &self,
        data_kind: &str,
        condition_kind: &str,
        value: u32,
    ) -> Result<broadcast::Receiver<NotificationEvent>, ServiceError> {
        if data_kind != GPS_DATA_KIND {
            return Err(ServiceError::InvalidRequest(format!(
                "unknown data kind '{}'",
                data_kind
            )));
        }

        let kind = SubscriptionKind::from_request(condition_kind)
            .ok_or_else(|| ServiceError::UnsupportedCondition(condition_kind.to_string()))?;

        let name = self
            .ctx
            .registry
            .add(kind, value, false, self.hub.as_ref())?;

        self.hub
            .subscribe(&name)
            .map_err(|e| ServiceError::CreationFailed(e.to_string()))
    }

    /// Confirm a subscription exists for this condition.
    ///
    /// Detaching is the caller dropping its receiver; the subscription
    /// itself is evicted once deliveries stop finding subscribers.
    pub fn unsubscribe(
        &self,
        data_kind: &str,
        condition_kind: &str,
        value: u32,
    ) -> Result<(), ServiceError> {
        if data_kind != GPS_DATA_KIND {
            return Err(ServiceError::InvalidRequest(format!(
                "unknown data kind '{}'",
                data_kind
            )));
        }

        let kind = SubscriptionKind::from_request(condition_kind).ok_or_else(|| {
            ServiceError::InvalidRequest(format!(
                "unknown condition kind '{}'",
                condition_kind
            ))
        })?;

        self.ctx
            .registry
            .find(kind, value)
            .map(|_| ())
            .ok_or(ServiceError::NotFound { kind, value })
    }

    /// Current daemon connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.ctx.connection_state()
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.ctx.registry.len()
    }

    /// Shared context, for embedding hosts that need direct access.
    pub fn context(&self) -> Arc<ServiceContext> {
        self.ctx.clone()
    }
}
