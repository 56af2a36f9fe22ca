//! Service configuration.

use std::num::NonZeroU32;
use std::time::Duration;

/// Environment variable naming the daemon host.
pub const ENV_HOST: &str = "GPSD_HOST";

/// Environment variable naming the daemon port.
pub const ENV_PORT: &str = "GPSD_PORT";

/// Default daemon host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default daemon port (gpsd's registered port).
pub const DEFAULT_PORT: &str = "2947";

/// Tuning for one service instance.
///
/// The defaults match a stock gpsd install on the local machine and the
/// retry/watchdog behavior the service has always shipped with; hosts
/// override individual fields with struct-update syntax:
///
/// ```
/// use gpslink::service::ServiceConfig;
/// use std::time::Duration;
///
/// let config = ServiceConfig {
///     host: "10.0.0.5".to_string(),
///     poll_timeout: Duration::from_secs(1),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Daemon host name or address.
    pub host: String,

    /// Daemon TCP port.
    pub port: String,

    /// Connection attempts before giving up; `None` retries forever.
    pub max_retries: Option<NonZeroU32>,

    /// First backoff delay after a failed connect.
    pub initial_retry_delay: Duration,

    /// Backoff ceiling.
    pub max_retry_delay: Duration,

    /// Timeout for a single poller read cycle.
    pub poll_timeout: Duration,

    /// Consecutive timed-out cycles before the poller declares the link
    /// dead.
    pub poll_watchdog_cycles: u32,

    /// Warm-up reads after connecting (daemon start-up race).
    pub warmup_reads: u32,

    /// Wait per warm-up read.
    pub warmup_wait: Duration,

    /// Evaluation cadence when no frequency subscription is active.
    pub default_eval_interval: Duration,

    /// Consecutive no-subscriber deliveries before idle eviction.
    pub idle_limit: u32,

    /// Emit JSON nulls for missing fix fields (legacy consumers).
    pub emit_null_fields: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT.to_string(),
            max_retries: None,
            initial_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(60),
            poll_timeout: Duration::from_secs(2),
            poll_watchdog_cycles: 60,
            warmup_reads: 5,
            warmup_wait: Duration::from_millis(2500),
            default_eval_interval: Duration::from_secs(1),
            idle_limit: 5,
            emit_null_fields: false,
        }
    }
}

impl ServiceConfig {
    /// Defaults with the daemon endpoint taken from `GPSD_HOST` /
    /// `GPSD_PORT` when set.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var(ENV_HOST).unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: std::env::var(ENV_PORT).unwrap_or_else(|_| DEFAULT_PORT.to_string()),
            ..Default::default()
        }
    }

    /// Defaults with an explicit daemon endpoint.
    pub fn with_endpoint(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            ..Default::default()
        }
    }

    /// Retry budget from a signed count, where zero or negative means
    /// unlimited.
    pub fn retry_budget(count: i64) -> Option<NonZeroU32> {
        u32::try_from(count).ok().and_then(NonZeroU32::new)
    }

    /// The daemon address in `host:port` form.
    pub fn daemon_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
