//! Daemon connection lifecycle.
//!
//! The connection manager is an infinite outer state machine: connect with
//! exponential backoff, warm the link up, hand it to the poller, and when
//! the poller reports the link dead, go around again. It has no terminal
//! success state - under normal operation [`ConnectionManager::run`] never
//! returns. The only way out is exhausting a finite retry budget, which is
//! surfaced to the caller as an error rather than tearing the process down.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::poller::{Poller, PollerConfig};
use super::protocol::WATCH_ENABLE;
use crate::evaluator::{EvaluationLoop, EvaluatorConfig};
use crate::notify::NotificationHub;
use crate::service::{ConnectionState, ServiceConfig, ServiceContext, ServiceError};

/// Exponential backoff between connection attempts.
///
/// Starts at the initial delay, doubles per failure, caps at the maximum,
/// and resets to the initial delay after any successful connect.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    initial: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a backoff sequence.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial,
            initial,
            max,
        }
    }

    /// Take the next delay and advance the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Reset to the initial delay after a success.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Owns the gpsd connection and keeps it alive forever.
pub struct ConnectionManager {
    config: ServiceConfig,
    ctx: Arc<ServiceContext>,
    hub: Arc<dyn NotificationHub>,
}

impl ConnectionManager {
    /// Create a manager over the shared context.
    pub fn new(
        config: ServiceConfig,
        ctx: Arc<ServiceContext>,
        hub: Arc<dyn NotificationHub>,
    ) -> Self {
        Self { config, ctx, hub }
    }

    /// Run the connect / poll / reconnect cycle.
    ///
    /// Never returns unless a finite `max_retries` budget is exhausted.
    pub async fn run(self) -> Result<(), ServiceError> {
        let addr = self.config.daemon_addr();
        let mut backoff = Backoff::new(
            self.config.initial_retry_delay,
            self.config.max_retry_delay,
        );

        loop {
            let stream = self.connect_with_retry(&addr, &mut backoff).await?;

            match self.serve_connection(stream).await {
                Ok(()) => {
                    self.ctx.set_connection_state(ConnectionState::Disconnected);
                    warn!(addr = %addr, "gpsd link lost, reconnecting");
                }
                Err(e) => {
                    // Setup failed after a successful connect (watch write);
                    // treat like a lost link and retry
                    self.ctx.set_connection_state(ConnectionState::Disconnected);
                    warn!(addr = %addr, error = %e, "Connection setup failed, retrying");
                }
            }
        }
    }

    /// Connect, retrying with backoff until success or an exhausted
    /// retry budget.
    async fn connect_with_retry(
        &self,
        addr: &str,
        backoff: &mut Backoff,
    ) -> Result<TcpStream, ServiceError> {
        let mut attempts: u32 = 0;

        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    backoff.reset();
                    return Ok(stream);
                }
                Err(e) => {
                    attempts += 1;
                    if let Some(max) = self.config.max_retries {
                        if attempts >= max.get() {
                            error!(addr = %addr, attempts, "Too many retries, aborting");
                            self.ctx.set_connection_state(ConnectionState::Disconnected);
                            return Err(ServiceError::RetriesExhausted(attempts));
                        }
                    }

                    let delay = backoff.next_delay();
                    self.ctx.set_connection_state(ConnectionState::Connecting {
                        attempt: attempts,
                        next_delay: delay,
                    });
                    info!(
                        addr = %addr,
                        error = %e,
                        delay_secs = delay.as_secs_f64(),
                        "gpsd not available yet, waiting before retry"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Drive one established connection until the link dies.
    async fn serve_connection(&self, stream: TcpStream) -> Result<(), ServiceError> {
        let (read_half, mut write_half) = stream.into_split();

        write_half.write_all(WATCH_ENABLE.as_bytes()).await?;
        debug!("Watch enabled");

        let lines = BufReader::new(read_half).lines();
        let mut poller = Poller::new(
            lines,
            self.ctx.clone(),
            PollerConfig {
                read_timeout: self.config.poll_timeout,
                watchdog_cycles: self.config.poll_watchdog_cycles,
            },
        );

        // Daemon start-up race: the socket accepts before devices produce
        // data, so give the first fix a bounded head start
        poller
            .warmup(self.config.warmup_reads, self.config.warmup_wait)
            .await;

        self.ctx.set_connected(true);
        self.ctx.set_connection_state(ConnectionState::Connected);
        info!(addr = %self.config.daemon_addr(), "Connected to gpsd");

        let evaluator = EvaluationLoop::new(
            self.ctx.clone(),
            self.hub.clone(),
            EvaluatorConfig {
                default_interval: self.config.default_eval_interval,
                idle_limit: self.config.idle_limit,
                emit_null_fields: self.config.emit_null_fields,
            },
        );
        let eval_handle = tokio::spawn(evaluator.run());

        // The poller clears `connected` on exit, which stops the
        // evaluation loop within one sleep interval
        poller.run().await;
        drop(write_half);
        let _ = eval_handle.await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::BroadcastHub;
    use std::num::NonZeroU32;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(), Duration::from_secs(16));
        assert_eq!(backoff.next_delay(), Duration::from_secs(32));
        assert_eq!(backoff.next_delay(), Duration::from_secs(60));
        assert_eq!(backoff.next_delay(), Duration::from_secs(60), "Capped");
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));

        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_finite_retry_budget_surfaces_error() {
        // Port 1 on localhost refuses immediately; keep delays tiny
        let config = ServiceConfig {
            host: "127.0.0.1".to_string(),
            port: "1".to_string(),
            max_retries: NonZeroU32::new(3),
            initial_retry_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(4),
            ..Default::default()
        };
        let ctx = Arc::new(ServiceContext::new());
        let hub: Arc<dyn NotificationHub> = Arc::new(BroadcastHub::new());

        let manager = ConnectionManager::new(config, ctx.clone(), hub);
        let result = manager.run().await;

        assert!(matches!(result, Err(ServiceError::RetriesExhausted(3))));
        assert_eq!(ctx.connection_state(), ConnectionState::Disconnected);
        assert!(!ctx.is_connected());
    }
}
