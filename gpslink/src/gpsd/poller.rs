//! Daemon read loop.
//!
//! While the link is up, the poller blocks on the gpsd line stream with a
//! timeout, feeding each TPV sentence into the fix store. It never
//! evaluates subscriptions - that is the evaluation loop's job, on its own
//! cadence.
//!
//! A watchdog bounds how long the poller tolerates silence: after a run of
//! consecutive timeout cycles with no data (about two minutes at the
//! defaults) the connection is declared dead even though the socket never
//! errored, which covers a wedged daemon or a half-open TCP link. A hard
//! read error or EOF ends the loop immediately. Either way the poller
//! clears the shared `connected` flag on the way out, which is what stops
//! the evaluation loop and wakes the connection manager's retry cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, BufReader, Lines};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use super::protocol::{self, Report, SatelliteSummary};
use crate::service::context::ServiceContext;

/// Poller tuning.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Timeout for a single read cycle.
    pub read_timeout: Duration,

    /// Consecutive timed-out cycles before the link is declared dead.
    pub watchdog_cycles: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(2),
            watchdog_cycles: 60,
        }
    }
}

/// Why the poller returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEnd {
    /// The watchdog gave up after consecutive silent cycles.
    Watchdog,
    /// The daemon closed the connection.
    Eof,
    /// A hard read error on the transport.
    ReadError,
}

/// Reads gpsd report lines and keeps the fix store current.
pub struct Poller<R> {
    lines: Lines<BufReader<R>>,
    ctx: Arc<ServiceContext>,
    config: PollerConfig,
    last_sky: Option<SatelliteSummary>,
    fixes_stored: u64,
}

impl<R: AsyncRead + Unpin> Poller<R> {
    /// Create a poller over a buffered line stream.
    pub fn new(lines: Lines<BufReader<R>>, ctx: Arc<ServiceContext>, config: PollerConfig) -> Self {
        Self {
            lines,
            ctx,
            config,
            last_sky: None,
            fixes_stored: 0,
        }
    }

    /// Bounded warm-up read loop.
    ///
    /// A daemon started by socket activation can accept the connection and
    /// then produce nothing for a few seconds while it opens its devices.
    /// Read up to `reads` lines with a per-read `wait` so the first fix is
    /// usually in the store before the service reports itself connected;
    /// give up quietly if the daemon stays silent, the main loop will pick
    /// the data up later.
    pub async fn warmup(&mut self, reads: u32, wait: Duration) {
        for attempt in 0..reads {
            match timeout(wait, self.lines.next_line()).await {
                Ok(Ok(Some(line))) => {
                    self.handle_line(&line);
                    if self.fixes_stored > 0 {
                        debug!(attempt, "Warm-up read produced a fix");
                        return;
                    }
                }
                Ok(Ok(None)) | Ok(Err(_)) => return,
                Err(_) => trace!(attempt, "Warm-up read timed out"),
            }
        }
    }

    /// Read until the link dies, then clear the `connected` flag.
    pub async fn run(mut self) -> PollEnd {
        let end = self.poll_loop().await;

        info!(
            fixes_stored = self.fixes_stored,
            reason = ?end,
            "Daemon connection lost, closing"
        );
        self.ctx.set_connected(false);
        end
    }

    async fn poll_loop(&mut self) -> PollEnd {
        let mut silent_cycles: u32 = 0;

        loop {
            match timeout(self.config.read_timeout, self.lines.next_line()).await {
                Ok(Ok(Some(line))) => {
                    silent_cycles = 0;
                    self.handle_line(&line);
                }
                Ok(Ok(None)) => {
                    debug!("Daemon closed the stream");
                    return PollEnd::Eof;
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Cannot read from GPS daemon");
                    return PollEnd::ReadError;
                }
                Err(_) => {
                    silent_cycles += 1;
                    trace!(silent_cycles, "No daemon data (timeout)");
                    if silent_cycles >= self.config.watchdog_cycles {
                        warn!(
                            cycles = silent_cycles,
                            "Watchdog expired with no daemon data"
                        );
                        return PollEnd::Watchdog;
                    }
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        match protocol::parse_report(line) {
            Some(Report::Tpv(tpv)) => {
                let fix = protocol::build_fix(&tpv, self.last_sky.as_ref());
                self.fixes_stored += 1;
                if self.fixes_stored == 1 {
                    info!(
                        mode = %fix.mode,
                        lat = ?fix.latitude,
                        lon = ?fix.longitude,
                        "First fix received"
                    );
                }
                self.ctx.fix_store.replace(fix);
            }
            Some(Report::Sky(sky)) => {
                self.last_sky = Some(sky.summary());
            }
            Some(Report::Other) => {}
            None => trace!(line, "Unparseable daemon line"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, DuplexStream};

    const TPV: &str = r#"{"class":"TPV","mode":3,"lat":53.5,"lon":10.0,"speed":12.5}"#;
    const SKY: &str = r#"{"class":"SKY","nSat":11,"uSat":7}"#;

    fn poller(
        stream: DuplexStream,
        config: PollerConfig,
    ) -> (Poller<DuplexStream>, Arc<ServiceContext>) {
        let ctx = Arc::new(ServiceContext::new());
        ctx.set_connected(true);
        let lines = BufReader::new(stream).lines();
        (Poller::new(lines, ctx.clone(), config), ctx)
    }

    fn fast_config() -> PollerConfig {
        PollerConfig {
            read_timeout: Duration::from_millis(20),
            watchdog_cycles: 3,
        }
    }

    #[tokio::test]
    async fn test_tpv_updates_store_and_eof_ends_loop() {
        let (mut client, server) = duplex(1024);
        let (poller, ctx) = poller(server, fast_config());

        client.write_all(TPV.as_bytes()).await.unwrap();
        client.write_all(b"\n").await.unwrap();
        drop(client);

        let end = poller.run().await;

        assert_eq!(end, PollEnd::Eof);
        assert!(!ctx.is_connected(), "Poller clears the flag on exit");

        let fix = ctx.fix_store.valid_snapshot().expect("fix stored");
        assert_eq!(fix.position(), Some((53.5, 10.0)));
    }

    #[tokio::test]
    async fn test_sky_counts_ride_along_with_next_tpv() {
        let (mut client, server) = duplex(1024);
        let (poller, ctx) = poller(server, fast_config());

        client
            .write_all(format!("{}\n{}\n", SKY, TPV).as_bytes())
            .await
            .unwrap();
        drop(client);

        poller.run().await;

        let fix = ctx.fix_store.valid_snapshot().unwrap();
        assert_eq!(fix.satellites_visible, Some(11));
        assert_eq!(fix.satellites_used, Some(7));
    }

    #[tokio::test]
    async fn test_watchdog_ends_silent_connection() {
        let (_client, server) = duplex(1024);
        let (poller, ctx) = poller(server, fast_config());

        // _client is held open but writes nothing: three 20ms cycles
        let end = poller.run().await;

        assert_eq!(end, PollEnd::Watchdog);
        assert!(!ctx.is_connected());
    }

    #[tokio::test]
    async fn test_data_resets_the_watchdog() {
        let (mut client, server) = duplex(1024);
        let (poller, ctx) = poller(server, fast_config());

        let writer = tokio::spawn(async move {
            // A silent cycle, a line, repeated - cumulative silence
            // passes the 3-cycle budget but consecutive silence never does
            for _ in 0..4 {
                tokio::time::sleep(Duration::from_millis(30)).await;
                client.write_all(TPV.as_bytes()).await.unwrap();
                client.write_all(b"\n").await.unwrap();
            }
            // Then go quiet long enough to trip the watchdog
            tokio::time::sleep(Duration::from_millis(200)).await;
            client
        });

        let end = poller.run().await;
        assert_eq!(end, PollEnd::Watchdog);
        assert!(ctx.fix_store.has_sample());
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_garbage_lines_are_skipped() {
        let (mut client, server) = duplex(1024);
        let (poller, ctx) = poller(server, fast_config());

        client
            .write_all(format!("not json\n{}\n", TPV).as_bytes())
            .await
            .unwrap();
        drop(client);

        poller.run().await;
        assert!(ctx.fix_store.has_sample());
    }

    #[tokio::test]
    async fn test_warmup_stops_after_first_fix() {
        let (mut client, server) = duplex(1024);
        let (mut poller, ctx) = poller(server, fast_config());

        client
            .write_all(format!("{}\n{}\n", SKY, TPV).as_bytes())
            .await
            .unwrap();

        poller
            .warmup(5, Duration::from_millis(50))
            .await;

        assert!(ctx.fix_store.has_sample(), "Warm-up stored the first fix");
    }

    #[tokio::test]
    async fn test_warmup_gives_up_quietly_on_silence() {
        let (_client, server) = duplex(1024);
        let (mut poller, ctx) = poller(server, fast_config());

        poller.warmup(3, Duration::from_millis(10)).await;

        assert!(!ctx.fix_store.has_sample());
        // Still connected - warm-up silence is not fatal
        assert!(ctx.is_connected());
    }
}
