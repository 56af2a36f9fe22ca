//! gpsd JSON-lines wire protocol.
//!
//! gpsd speaks newline-delimited JSON over TCP. The client enables
//! streaming with a `?WATCH` command and then receives a mix of report
//! classes; this service cares about `TPV` (time-position-velocity) and
//! `SKY` (satellite view) and ignores the rest (`VERSION`, `DEVICES`,
//! watch acknowledgements, ...).
//!
//! Satellite counts arrive in SKY sentences, not TPV, so the poller keeps
//! the latest [`SatelliteSummary`] on hand and stamps it into each fix
//! built from a TPV. The fix itself is always assembled from scratch -
//! the store is never merged in place.

use chrono::DateTime;
use serde::Deserialize;

use crate::fix::{Fix, FixMode};

/// Watch command sent once after connecting.
///
/// Requests streaming of JSON reports for all devices.
pub const WATCH_ENABLE: &str = "?WATCH={\"enable\":true,\"json\":true};\n";

/// A parsed report line.
#[derive(Debug, Clone)]
pub enum Report {
    /// Time-position-velocity sentence.
    Tpv(TpvReport),
    /// Satellite view sentence.
    Sky(SkyReport),
    /// Any other class; received and ignored.
    Other,
}

/// TPV sentence fields this service consumes.
///
/// Field names follow the gpsd protocol; all measurement fields are
/// optional because receivers report only what they can measure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TpvReport {
    /// Fix mode: 0=unknown, 1=no fix, 2=2D, 3=3D.
    #[serde(default)]
    pub mode: u8,

    pub lat: Option<f64>,
    pub lon: Option<f64>,

    /// Latitude error estimate in meters.
    pub epy: Option<f64>,
    /// Longitude error estimate in meters.
    pub epx: Option<f64>,

    /// Ground speed in m/s.
    pub speed: Option<f64>,
    /// Speed error estimate in m/s.
    pub eps: Option<f64>,

    /// Altitude MSL in meters. Older gpsd releases call this `alt`,
    /// newer ones `altMSL`.
    #[serde(alias = "altMSL")]
    pub alt: Option<f64>,
    /// Vertical error estimate in meters.
    pub epv: Option<f64>,

    /// Climb rate in m/s.
    pub climb: Option<f64>,
    /// Climb error estimate in m/s.
    pub epc: Option<f64>,

    /// Course over ground in degrees from true north.
    pub track: Option<f64>,
    /// Track error estimate in degrees.
    pub epd: Option<f64>,

    /// Fix time: ISO 8601 string on current gpsd, epoch seconds on old
    /// releases.
    pub time: Option<TpvTime>,
    /// Time error estimate in seconds.
    pub ept: Option<f64>,
}

/// TPV time field in either of its historical wire encodings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TpvTime {
    /// ISO 8601 timestamp (gpsd protocol >= 3.20).
    Iso(String),
    /// Seconds since the Unix epoch (older protocol versions).
    Epoch(f64),
}

impl TpvTime {
    /// Convert to seconds since the Unix epoch.
    ///
    /// Returns `None` for an unparseable ISO string.
    pub fn to_epoch_seconds(&self) -> Option<f64> {
        match self {
            Self::Epoch(secs) => Some(*secs),
            Self::Iso(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9),
        }
    }
}

/// SKY sentence fields this service consumes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkyReport {
    /// Satellites in view (newer gpsd reports this directly).
    #[serde(rename = "nSat")]
    pub n_sat: Option<u32>,

    /// Satellites used in the solution.
    #[serde(rename = "uSat")]
    pub u_sat: Option<u32>,

    /// Per-satellite records; used to derive the counts when the summary
    /// fields are absent.
    #[serde(default)]
    pub satellites: Vec<SkySatellite>,
}

/// One satellite record inside a SKY sentence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkySatellite {
    /// Whether this satellite participates in the solution.
    #[serde(default)]
    pub used: bool,
}

/// Satellite counts distilled from the latest SKY sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatelliteSummary {
    /// Satellites in view.
    pub visible: u32,
    /// Satellites used in the solution.
    pub used: u32,
}

impl SkyReport {
    /// Distill the counts, preferring the summary fields over counting
    /// the satellite list.
    pub fn summary(&self) -> SatelliteSummary {
        SatelliteSummary {
            visible: self.n_sat.unwrap_or(self.satellites.len() as u32),
            used: self
                .u_sat
                .unwrap_or_else(|| self.satellites.iter().filter(|s| s.used).count() as u32),
        }
    }
}

/// Parse one report line.
///
/// Returns `None` for lines that are not JSON objects with a `class`
/// field (garbage on the wire); unknown classes parse to
/// [`Report::Other`].
pub fn parse_report(line: &str) -> Option<Report> {
    let value: serde_json::Value = serde_json::from_str(line.trim()).ok()?;
    let class = value.get("class")?.as_str()?.to_string();
    match class.as_str() {
        "TPV" => serde_json::from_value(value).ok().map(Report::Tpv),
        "SKY" => serde_json::from_value(value).ok().map(Report::Sky),
        _ => Some(Report::Other),
    }
}

/// Assemble a fix from a TPV sentence and the latest satellite counts.
pub fn build_fix(tpv: &TpvReport, sky: Option<&SatelliteSummary>) -> Fix {
    Fix {
        mode: FixMode::from_raw(tpv.mode),
        satellites_visible: sky.map(|s| s.visible),
        satellites_used: sky.map(|s| s.used),
        latitude: tpv.lat,
        latitude_error: tpv.epy,
        longitude: tpv.lon,
        longitude_error: tpv.epx,
        speed: tpv.speed,
        speed_error: tpv.eps,
        altitude: tpv.alt,
        altitude_error: tpv.epv,
        climb: tpv.climb,
        climb_error: tpv.epc,
        track: tpv.track,
        track_error: tpv.epd,
        time: tpv.time.as_ref().and_then(TpvTime::to_epoch_seconds),
        time_error: tpv.ept,
    }
}
