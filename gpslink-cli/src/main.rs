//! GPSLink CLI - Command-line interface
//!
//! Runs the GPS service against a gpsd daemon and streams any requested
//! condition-triggered notifications to stdout, one JSON line per
//! notification prefixed with its channel name.

mod error;
mod runner;

use clap::Parser;

use gpslink::service::{GpsService, ServiceConfig, GPS_DATA_KIND};
use tokio::sync::broadcast::error::RecvError;

use error::CliError;
use runner::CliRunner;

#[derive(Debug, Parser)]
#[command(name = "gpslink")]
#[command(about = "Stream GNSS fixes and notifications from gpsd", long_about = None)]
#[command(version = gpslink::VERSION)]
struct Args {
    /// gpsd host (overrides GPSD_HOST; default localhost)
    #[arg(long)]
    host: Option<String>,

    /// gpsd TCP port (overrides GPSD_PORT; default 2947)
    #[arg(long)]
    port: Option<String>,

    /// Connection attempts before giving up; 0 or negative retries forever
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    max_retries: i64,

    /// Subscribe to periodic fixes at this rate in Hz (1, 10, 20, 50, 100)
    #[arg(long)]
    frequency: Option<u32>,

    /// Subscribe to movement notifications at this threshold in meters
    /// (1, 10, 100, 300, 500, 1000)
    #[arg(long)]
    movement: Option<u32>,

    /// Subscribe to speed-limit notifications at this threshold in km/h
    /// (20, 30, 50, 90, 110, 130)
    #[arg(long)]
    max_speed: Option<u32>,

    /// Emit JSON nulls for fields the receiver did not report
    #[arg(long)]
    compat_null_fields: bool,

    /// Enable debug logging regardless of RUST_LOG
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn service_config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::from_env();
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        config.max_retries = ServiceConfig::retry_budget(self.max_retries);
        config.emit_null_fields = self.compat_null_fields;
        config
    }

    /// The (condition kind, threshold) pairs requested on the command line.
    fn subscriptions(&self) -> Vec<(&'static str, u32)> {
        [
            ("frequency", self.frequency),
            ("movement", self.movement),
            ("max_speed", self.max_speed),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.map(|v| (kind, v)))
        .collect()
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    let config = args.service_config();
    runner.log_startup(&config.daemon_addr());

    let service = GpsService::new(config);

    for (kind, value) in args.subscriptions() {
        let mut rx = service
            .subscribe(GPS_DATA_KIND, kind, value)
            .map_err(CliError::Subscribe)?;

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => println!("{} {}", event.channel, event.payload),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Notification stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    service.run().await.map_err(CliError::Service)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_bare_invocation() {
        let args = Args::parse_from(["gpslink"]);

        assert!(args.host.is_none());
        assert!(args.port.is_none());
        assert_eq!(args.max_retries, -1);
        assert!(args.subscriptions().is_empty());
        assert!(!args.compat_null_fields);
    }

    #[test]
    fn test_endpoint_flags_override_config() {
        let args = Args::parse_from(["gpslink", "--host", "10.0.0.5", "--port", "12000"]);
        let config = args.service_config();

        assert_eq!(config.daemon_addr(), "10.0.0.5:12000");
    }

    #[test]
    fn test_negative_retries_means_unlimited() {
        let args = Args::parse_from(["gpslink", "--max-retries", "-1"]);
        assert!(args.service_config().max_retries.is_none());

        let args = Args::parse_from(["gpslink", "--max-retries", "30"]);
        assert_eq!(
            args.service_config().max_retries.map(|n| n.get()),
            Some(30)
        );
    }

    #[test]
    fn test_subscription_flags_collect() {
        let args = Args::parse_from([
            "gpslink",
            "--frequency",
            "10",
            "--movement",
            "100",
            "--max-speed",
            "90",
        ]);

        assert_eq!(
            args.subscriptions(),
            vec![("frequency", 10), ("movement", 100), ("max_speed", 90)]
        );
    }
}
