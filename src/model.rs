/// Core data types for the HF propagation service.
///
/// This module defines the shared domain model imported by all other
/// modules: stations, space-weather snapshots, path queries, interpolation
/// results, operating modes and the error enums. It contains no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// A point on the Earth's surface in degrees (WGS84 is close enough).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

// ---------------------------------------------------------------------------
// Ionosonde stations
// ---------------------------------------------------------------------------

/// One validated ionosonde sounding.
///
/// Only stations that passed ingestion checks exist as `Station` values:
/// foF2 present, confidence > 0, observation within the freshness window,
/// longitude normalised to [-180, 180].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub code: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// F2-layer critical frequency, MHz.
    pub fof2: f64,
    /// MUF(3000)F2, MHz.
    pub mufd: Option<f64>,
    /// F2-layer peak height, km.
    pub hmf2: Option<f64>,
    /// M(3000)F2 factor. Defaults to 3.0 when the station does not report it.
    pub md: f64,
    /// KC2G confidence score, 0–100.
    pub confidence: f64,
    pub observed_at: DateTime<Utc>,
}

/// How an `InterpolationResult` was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// A station sits within the direct radius; its values are used as-is.
    Direct,
    /// Inverse-distance weighted blend of the nearest stations.
    Interpolated,
    /// No station within the coverage radius.
    NoCoverage,
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpolationMethod::Direct => write!(f, "direct"),
            InterpolationMethod::Interpolated => write!(f, "interpolated"),
            InterpolationMethod::NoCoverage => write!(f, "no-coverage"),
        }
    }
}

/// Nearest station to an interpolation point, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestStation {
    pub code: String,
    pub name: String,
    pub distance_km: f64,
}

/// Ionospheric parameters estimated at an arbitrary point.
///
/// For `NoCoverage` every field is `None` and only `nearest` may be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationResult {
    pub method: InterpolationMethod,
    pub fof2: Option<f64>,
    pub mufd: Option<f64>,
    pub hmf2: Option<f64>,
    pub md: Option<f64>,
    pub nearest: Option<NearestStation>,
    pub stations_used: usize,
}

impl InterpolationResult {
    pub fn no_coverage(nearest: Option<NearestStation>) -> Self {
        Self {
            method: InterpolationMethod::NoCoverage,
            fof2: None,
            mufd: None,
            hmf2: None,
            md: None,
            nearest,
            stations_used: 0,
        }
    }

    pub fn has_coverage(&self) -> bool {
        self.method != InterpolationMethod::NoCoverage
    }
}

// ---------------------------------------------------------------------------
// Space weather
// ---------------------------------------------------------------------------

pub const DEFAULT_SSN: f64 = 70.0;
pub const DEFAULT_KP: f64 = 3.0;
pub const DEFAULT_BZ: f64 = 0.0;
pub const DEFAULT_SW_SPEED: f64 = 400.0;
pub const DEFAULT_SFI: f64 = 150.0;

/// Point-in-time space-weather conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpaceWeatherSnapshot {
    /// Smoothed sunspot number.
    pub ssn: f64,
    /// Planetary K index, 0–9.
    pub kp: f64,
    /// IMF Bz, nT.
    pub bz: f64,
    /// Solar wind speed, km/s.
    pub sw_speed: f64,
    /// 10.7 cm solar flux, sfu.
    pub sfi: f64,
}

impl Default for SpaceWeatherSnapshot {
    fn default() -> Self {
        Self {
            ssn: DEFAULT_SSN,
            kp: DEFAULT_KP,
            bz: DEFAULT_BZ,
            sw_speed: DEFAULT_SW_SPEED,
            sfi: DEFAULT_SFI,
        }
    }
}

impl SpaceWeatherSnapshot {
    /// Stable textual identity used in render fingerprints. Two snapshots
    /// with the same identity produce the same map.
    pub fn identity(&self) -> String {
        format!(
            "ssn={:.1};kp={:.2};bz={:.2};sw={:.1};sfi={:.1}",
            self.ssn, self.kp, self.bz, self.sw_speed, self.sfi
        )
    }
}

// ---------------------------------------------------------------------------
// Operating modes
// ---------------------------------------------------------------------------

/// Operating mode. Weak-signal modes get a dB advantage over SSB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Cw,
    Ft8,
    Ft4,
    Jt65,
    Wspr,
    Ssb,
    Am,
    Fm,
    Rtty,
    Psk31,
    /// A numeric client code with no known mode.
    Other(u16),
}

impl Mode {
    /// Maps the numeric MODE request parameter used by HamClock clients.
    pub fn from_code(code: u16) -> Mode {
        match code {
            38 => Mode::Ssb,
            22 => Mode::Rtty,
            49 => Mode::Am,
            13 => Mode::Ft8,
            19 => Mode::Cw,
            17 => Mode::Ft4,
            3 => Mode::Wspr,
            other => Mode::Other(other),
        }
    }

    /// Parses a mode name, case-insensitively. Unknown names give `None`.
    pub fn from_name(name: &str) -> Option<Mode> {
        match name.trim().to_ascii_uppercase().as_str() {
            "CW" => Some(Mode::Cw),
            "FT8" => Some(Mode::Ft8),
            "FT4" => Some(Mode::Ft4),
            "JT65" => Some(Mode::Jt65),
            "WSPR" => Some(Mode::Wspr),
            "SSB" => Some(Mode::Ssb),
            "AM" => Some(Mode::Am),
            "FM" => Some(Mode::Fm),
            "RTTY" => Some(Mode::Rtty),
            "PSK31" => Some(Mode::Psk31),
            _ => None,
        }
    }

    /// dB advantage over a 100 W SSB signal at the same power.
    pub fn advantage_db(&self) -> f64 {
        match self {
            Mode::Cw => 16.0,
            Mode::Ft8 => 12.0,
            Mode::Ft4 => 10.0,
            Mode::Jt65 => 15.0,
            Mode::Wspr => 25.0,
            Mode::Ssb => 0.0,
            Mode::Am => -6.0,
            Mode::Fm => -3.0,
            Mode::Rtty => 5.0,
            Mode::Psk31 => 14.0,
            Mode::Other(_) => 0.0,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Cw => write!(f, "CW"),
            Mode::Ft8 => write!(f, "FT8"),
            Mode::Ft4 => write!(f, "FT4"),
            Mode::Jt65 => write!(f, "JT65"),
            Mode::Wspr => write!(f, "WSPR"),
            Mode::Ssb => write!(f, "SSB"),
            Mode::Am => write!(f, "AM"),
            Mode::Fm => write!(f, "FM"),
            Mode::Rtty => write!(f, "RTTY"),
            Mode::Psk31 => write!(f, "PSK31"),
            Mode::Other(code) => write!(f, "M{}", code),
        }
    }
}

// ---------------------------------------------------------------------------
// Path queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathType {
    Short,
    Long,
}

impl PathType {
    /// PATH request parameter: 1 is long path, anything else short.
    pub fn from_code(code: i64) -> PathType {
        if code == 1 { PathType::Long } else { PathType::Short }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PathType::Short => "SP",
            PathType::Long => "LP",
        }
    }
}

/// One single-path prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PathQuery {
    pub tx: GeoPoint,
    pub rx: GeoPoint,
    pub freq_mhz: f64,
    pub mode: Mode,
    pub power_watts: f64,
    /// Minimum takeoff angle, degrees.
    pub toa_deg: f64,
    /// UTC hour, may be fractional.
    pub utc_hour: f64,
    pub month: u32,
    pub year: i32,
    pub path: PathType,
}

/// Result of a single-path prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct PointPrediction {
    pub muf_mhz: f64,
    /// Reliability as a fraction, 0.0–0.99.
    pub reliability: f64,
    pub distance_km: f64,
    /// Beam heading from TX, degrees clockwise from north.
    pub bearing_deg: f64,
    pub midpoint: GeoPoint,
    pub method: InterpolationMethod,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or parsing the ionosonde feed.
#[derive(Debug, PartialEq)]
pub enum IngestError {
    /// Non-2xx HTTP response from the feed.
    HttpError(u16),
    /// Connection, TLS or timeout failure before a response arrived.
    Transport(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// The feed answered but listed no stations at all.
    NoStations,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::HttpError(code) => write!(f, "HTTP error: {}", code),
            IngestError::Transport(msg) => write!(f, "Transport error: {}", msg),
            IngestError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            IngestError::NoStations => write!(f, "No stations in feed response"),
        }
    }
}

impl std::error::Error for IngestError {}

/// The single failure signal returned by the request-level API.
#[derive(Debug, PartialEq)]
pub enum ServiceError {
    /// A request parameter was present but unusable.
    InvalidParameter { name: String, value: String },
    /// The map could not be produced.
    Render(String),
    /// Reading configuration or assets failed.
    Io(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::InvalidParameter { name, value } => {
                write!(f, "Invalid parameter {}='{}'", name, value)
            }
            ServiceError::Render(msg) => write!(f, "Render error: {}", msg),
            ServiceError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_codes_match_client_table() {
        assert_eq!(Mode::from_code(38), Mode::Ssb);
        assert_eq!(Mode::from_code(22), Mode::Rtty);
        assert_eq!(Mode::from_code(49), Mode::Am);
        assert_eq!(Mode::from_code(13), Mode::Ft8);
        assert_eq!(Mode::from_code(19), Mode::Cw);
        assert_eq!(Mode::from_code(17), Mode::Ft4);
        assert_eq!(Mode::from_code(3), Mode::Wspr);
        assert_eq!(Mode::from_code(99), Mode::Other(99));
    }

    #[test]
    fn test_unknown_mode_has_no_advantage_and_prints_code() {
        let mode = Mode::from_code(7);
        assert_eq!(mode.advantage_db(), 0.0);
        assert_eq!(mode.to_string(), "M7");
    }

    #[test]
    fn test_mode_names_are_case_insensitive() {
        assert_eq!(Mode::from_name("cw"), Some(Mode::Cw));
        assert_eq!(Mode::from_name("Psk31"), Some(Mode::Psk31));
        assert_eq!(Mode::from_name("olivia"), None);
    }

    #[test]
    fn test_path_type_codes() {
        assert_eq!(PathType::from_code(0), PathType::Short);
        assert_eq!(PathType::from_code(1), PathType::Long);
        assert_eq!(PathType::from_code(7), PathType::Short);
        assert_eq!(PathType::Long.label(), "LP");
    }

    #[test]
    fn test_space_weather_defaults() {
        let swx = SpaceWeatherSnapshot::default();
        assert_eq!(swx.ssn, 70.0);
        assert_eq!(swx.kp, 3.0);
        assert_eq!(swx.bz, 0.0);
        assert_eq!(swx.sw_speed, 400.0);
    }

    #[test]
    fn test_snapshot_identity_changes_with_any_field() {
        let base = SpaceWeatherSnapshot::default();
        let stormy = SpaceWeatherSnapshot { kp: 6.0, ..base };
        assert_ne!(base.identity(), stormy.identity());
        assert_eq!(base.identity(), SpaceWeatherSnapshot::default().identity());
    }

    #[test]
    fn test_ingest_error_display_is_classifiable() {
        // logging::classify_feed_failure keys off these prefixes
        assert!(IngestError::HttpError(500).to_string().starts_with("HTTP error"));
        assert!(IngestError::ParseError("x".into()).to_string().starts_with("Parse error"));
    }
}
