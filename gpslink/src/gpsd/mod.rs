//! gpsd daemon link.
//!
//! Everything that touches the daemon lives here:
//!
//! - [`protocol`] - JSON-lines wire format (WATCH command, TPV/SKY parsing)
//! - [`connection`] - `ConnectionManager`, the reconnect state machine
//! - [`poller`] - `Poller`, the timed read loop with its watchdog
//!
//! The split mirrors the runtime shape: the connection manager owns the
//! socket lifecycle, the poller owns reads on an established socket, and
//! the protocol module is pure parsing shared by both.

pub mod connection;
pub mod poller;
pub mod protocol;

pub use connection::{Backoff, ConnectionManager};
pub use poller::{PollEnd, Poller, PollerConfig};
pub use protocol::{parse_report, Report, WATCH_ENABLE};
