//! Subscription evaluation loop.
//!
//! While the daemon link is up, the loop wakes on an adaptive cadence,
//! snapshots the latest fix, and fires every subscription whose trigger
//! predicate crosses. The cadence follows the fastest requested frequency
//! subscription (1/highest Hz) and falls back to 1 Hz when only movement
//! or speed conditions - or nothing at all - are registered.
//!
//! Each pass runs in three steps so no publish ever happens under the
//! registry lock: collect firing channels (lock), publish (no lock),
//! apply outcomes and evictions (lock). A subscription added mid-pass is
//! picked up on the next pass; one evicted mid-pass is simply gone from
//! the owned collection and can never be touched again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::fix::payload::fix_payload;
use crate::fix::Fix;
use crate::notify::{NotificationHub, PublishError};
use crate::service::context::ServiceContext;

/// Evaluation loop tuning.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Cadence when no frequency subscription is active.
    pub default_interval: Duration,

    /// Consecutive no-subscriber deliveries before an unprotected
    /// subscription is evicted.
    pub idle_limit: u32,

    /// Emit JSON nulls for missing fix fields (legacy consumers).
    pub emit_null_fields: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(1),
            idle_limit: 5,
            emit_null_fields: false,
        }
    }
}

/// Sleep interval for a pass given the highest requested frequency.
pub fn cadence(highest_frequency: u32, default_interval: Duration) -> Duration {
    if highest_frequency > 0 {
        Duration::from_secs_f64(1.0 / f64::from(highest_frequency))
    } else {
        default_interval
    }
}

/// The evaluation loop itself.
///
/// Owns nothing; works against the shared [`ServiceContext`] and publishes
/// through the hub. One instance is spawned per connection cycle and runs
/// until the `connected` flag clears.
pub struct EvaluationLoop {
    ctx: Arc<ServiceContext>,
    hub: Arc<dyn NotificationHub>,
    config: EvaluatorConfig,
}

impl EvaluationLoop {
    /// Create an evaluation loop over the shared context.
    pub fn new(
        ctx: Arc<ServiceContext>,
        hub: Arc<dyn NotificationHub>,
        config: EvaluatorConfig,
    ) -> Self {
        Self { ctx, hub, config }
    }

    /// Run until the daemon link drops.
    ///
    /// The flag is checked at loop top, so worst-case shutdown latency is
    /// one sleep interval.
    pub async fn run(self) {
        debug!("Evaluation loop started");

        while self.ctx.is_connected() {
            let interval = cadence(
                self.ctx.registry.highest_frequency(),
                self.config.default_interval,
            );

            // No fix means no evaluation and no publish at all this pass
            if let Some(fix) = self.ctx.fix_store.valid_snapshot() {
                self.evaluate_pass(&fix, Instant::now());
            }

            tokio::time::sleep(interval).await;
        }

        debug!("Evaluation loop stopped");
    }

    /// Run one evaluation pass against a fix snapshot.
    ///
    /// Split out from [`run`](Self::run) so the pass logic is testable
    /// without a live connection.
    pub fn evaluate_pass(&self, fix: &Fix, now: Instant) {
        if !fix.is_valid() {
            return;
        }

        let firing = self.ctx.registry.collect_firings(fix, now);
        if firing.is_empty() {
            return;
        }

        let Some(payload) = fix_payload(fix, self.config.emit_null_fields) else {
            return;
        };

        let outcomes: Vec<(String, bool)> = firing
            .into_iter()
            .map(|name| {
                let delivered = match self.hub.publish(&name, &payload) {
                    Ok(()) => true,
                    Err(PublishError::NoSubscriber(_)) => false,
                    Err(PublishError::UnknownChannel(_)) => {
                        warn!(channel = %name, "Publish hit an unknown channel");
                        false
                    }
                };
                (name, delivered)
            })
            .collect();

        let evicted = self
            .ctx
            .registry
            .apply_outcomes(&outcomes, fix, self.config.idle_limit);

        for name in evicted {
            self.hub.remove_channel(&name);
            info!(channel = %name, "Evicted idle subscription");
        }
    }
}
