//! GNSS fix data model.
//!
//! A [`Fix`] is one reported position/motion sample from the daemon, carrying
//! a validity mode and whatever measurement fields the receiver produced.
//! Fields the underlying feed did not report are `None` and stay out of
//! client payloads.
//!
//! # Components
//!
//! - [`FixMode`] - Fix validity (no fix / 2D / 3D)
//! - [`Fix`] - Complete fix snapshot
//! - [`store`] - `FixStore`, the shared latest-fix slot
//! - [`payload`] - JSON marshalling for client-facing responses

pub mod payload;
pub mod store;

pub use store::FixStore;

/// Fix validity mode.
///
/// A fix below [`FixMode::TwoDimensional`] must never reach clients; it is
/// reported as "no fix" on query and skipped by the evaluation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum FixMode {
    /// No usable fix (also covers "mode unknown").
    #[default]
    NoFix,
    /// Latitude/longitude only.
    TwoDimensional,
    /// Full position including altitude and climb.
    ThreeDimensional,
}

impl FixMode {
    /// Map gpsd's numeric mode field (0=unknown, 1=no fix, 2=2D, 3=3D).
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            2 => Self::TwoDimensional,
            3 => Self::ThreeDimensional,
            _ => Self::NoFix,
        }
    }

    /// Numeric form used in client payloads (matches the daemon's encoding).
    pub fn as_raw(&self) -> u8 {
        match self {
            Self::NoFix => 1,
            Self::TwoDimensional => 2,
            Self::ThreeDimensional => 3,
        }
    }
}

impl std::fmt::Display for FixMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFix => write!(f, "NoFix"),
            Self::TwoDimensional => write!(f, "2D"),
            Self::ThreeDimensional => write!(f, "3D"),
        }
    }
}

/// One position/motion sample.
///
/// Overwritten wholesale on each successful daemon read; never partially
/// merged. Satellite counts ride along from the most recent sky view so a
/// snapshot is self-contained.
///
/// Units follow the daemon: speed and climb in m/s, altitude in meters MSL,
/// track in degrees true, errors in the same unit as their field, timestamp
/// in seconds since the Unix epoch.
#[derive(Debug, Clone, Default)]
pub struct Fix {
    /// Fix validity mode.
    pub mode: FixMode,

    /// Satellites in view.
    pub satellites_visible: Option<u32>,

    /// Satellites used in the solution.
    pub satellites_used: Option<u32>,

    /// Latitude in degrees (-90 to 90).
    pub latitude: Option<f64>,

    /// Latitude error estimate in meters.
    pub latitude_error: Option<f64>,

    /// Longitude in degrees (-180 to 180).
    pub longitude: Option<f64>,

    /// Longitude error estimate in meters.
    pub longitude_error: Option<f64>,

    /// Ground speed in m/s.
    pub speed: Option<f64>,

    /// Speed error estimate in m/s.
    pub speed_error: Option<f64>,

    /// Altitude MSL in meters (3D fixes only).
    pub altitude: Option<f64>,

    /// Altitude error estimate in meters.
    pub altitude_error: Option<f64>,

    /// Climb rate in m/s (3D fixes only).
    pub climb: Option<f64>,

    /// Climb error estimate in m/s.
    pub climb_error: Option<f64>,

    /// Course over ground in degrees from true north.
    pub track: Option<f64>,

    /// Track error estimate in degrees.
    pub track_error: Option<f64>,

    /// Fix timestamp in seconds since the Unix epoch.
    pub time: Option<f64>,

    /// Timestamp error estimate in seconds.
    pub time_error: Option<f64>,
}

impl Fix {
    /// Whether this fix is good enough to publish (2D or better).
    pub fn is_valid(&self) -> bool {
        self.mode >= FixMode::TwoDimensional
    }

    /// Current position as (latitude, longitude), if both are present.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Ground speed in km/h, if reported.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed.map(|ms| ms * 3.6)
    }
}
