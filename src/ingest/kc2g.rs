/// KC2G ionosonde feed client
///
/// Retrieves real-time GIRO ionosonde soundings from the KC2G propagation
/// API and turns them into validated `Station` values.
///
/// API: https://prop.kc2g.com/api/stations.json
///
/// The feed is loosely typed: coordinates usually arrive as strings, the
/// measurements as numbers or `null`, and some stations omit fields
/// entirely. Deserialization is lenient; validation happens afterwards in
/// `validate_record`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};
use std::time::Duration as StdDuration;

use crate::freshness::{is_fresh_at, parse_timestamp};
use crate::geo::normalize_lon;
use crate::model::{IngestError, Station};

pub const KC2G_STATIONS_URL: &str = "https://prop.kc2g.com/api/stations.json";

/// M(3000)F2 assumed when a station does not report one.
pub const DEFAULT_MD: f64 = 3.0;

// ============================================================================
// KC2G API Response Structures
// ============================================================================

/// Station identity block nested in each record.
#[derive(Debug, Clone, Deserialize)]
pub struct Kc2gStationInfo {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
}

/// One sounding as listed by the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Kc2gRecord {
    pub station: Option<Kc2gStationInfo>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fof2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mufd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub hmf2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub md: Option<f64>,
    /// Confidence score, 0 to 100.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cs: Option<f64>,
    pub time: Option<String>,
}

/// Accepts a JSON number, a numeric string, or null/absent. Strings such
/// as "NaN" or "inf" parse as floats but are treated as absent.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(serde_json::Value::String(s)) => {
            s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    })
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Builds the blocking HTTP client used for feed requests.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::blocking::Client, IngestError> {
    reqwest::blocking::Client::builder()
        .timeout(StdDuration::from_secs(timeout_secs))
        .user_agent("hfprop_service/0.1 (+ionosonde ingest)")
        .build()
        .map_err(|e| IngestError::Transport(e.to_string()))
}

/// Fetch the raw station list
///
/// # Parameters
/// - `client`: HTTP client (carries the request timeout)
/// - `url`: feed URL, normally `KC2G_STATIONS_URL`
///
/// # Returns
/// Every record in the response, unvalidated
pub fn fetch_records(
    client: &reqwest::blocking::Client,
    url: &str,
) -> Result<Vec<Kc2gRecord>, IngestError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| IngestError::Transport(e.to_string()))?;

    if !response.status().is_success() {
        return Err(IngestError::HttpError(response.status().as_u16()));
    }

    let body = response
        .text()
        .map_err(|e| IngestError::Transport(e.to_string()))?;

    parse_records(&body)
}

/// Parse a feed response body.
pub fn parse_records(body: &str) -> Result<Vec<Kc2gRecord>, IngestError> {
    let records: Vec<Kc2gRecord> =
        serde_json::from_str(body).map_err(|e| IngestError::ParseError(e.to_string()))?;

    if records.is_empty() {
        return Err(IngestError::NoStations);
    }
    Ok(records)
}

// ============================================================================
// Validation
// ============================================================================

/// Why a record was rejected at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    MissingIdentity,
    MissingFof2,
    NoConfidence,
    BadTimestamp(String),
    Stale { age_hours: i64 },
    MissingCoordinates,
    BadCoordinates { lat: f64, lon: f64 },
}

/// Turns a raw record into a `Station`, or says why it cannot be used.
///
/// A record is kept only if it has a station code, a non-zero foF2, a
/// positive confidence score, a timestamp within `window` of `now` and
/// coordinates on the globe (longitudes may use the 0..360 convention).
/// Zero-valued optional fields are treated as absent, matching how the feed
/// encodes "not measured".
pub fn validate_record(
    record: &Kc2gRecord,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Station, Rejection> {
    let info = record.station.as_ref().ok_or(Rejection::MissingIdentity)?;
    let code = info
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(Rejection::MissingIdentity)?;

    let fof2 = record
        .fof2
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or(Rejection::MissingFof2)?;

    let confidence = record.cs.unwrap_or(0.0);
    if !confidence.is_finite() || confidence <= 0.0 {
        return Err(Rejection::NoConfidence);
    }

    let raw_time = record.time.as_deref().unwrap_or("");
    let observed_at = parse_timestamp(raw_time).map_err(Rejection::BadTimestamp)?;
    if !is_fresh_at(observed_at, window, now) {
        return Err(Rejection::Stale {
            age_hours: now.signed_duration_since(observed_at).num_hours(),
        });
    }

    let (lat, lon) = match (info.latitude, info.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(Rejection::MissingCoordinates),
    };
    if !(-90.0..=90.0).contains(&lat) || !(-360.0..=360.0).contains(&lon) {
        return Err(Rejection::BadCoordinates { lat, lon });
    }
    let lon = normalize_lon(lon);

    let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);

    Ok(Station {
        code: code.to_string(),
        name: info.name.clone().unwrap_or_else(|| code.to_string()),
        lat,
        lon,
        fof2,
        mufd: positive(record.mufd),
        hmf2: positive(record.hmf2),
        md: positive(record.md).unwrap_or(DEFAULT_MD),
        confidence,
        observed_at,
    })
}

/// Validates a whole feed response, dropping rejected records.
///
/// Returns the kept stations and the number dropped.
pub fn ingest_records(
    records: &[Kc2gRecord],
    now: DateTime<Utc>,
    window: Duration,
) -> (Vec<Station>, usize) {
    let mut kept = Vec::with_capacity(records.len());
    let mut dropped = 0;
    for record in records {
        match validate_record(record, now, window) {
            Ok(station) => kept.push(station),
            Err(reason) => {
                dropped += 1;
                let code = record
                    .station
                    .as_ref()
                    .and_then(|s| s.code.as_deref())
                    .unwrap_or("?");
                crate::logging::debug(
                    crate::logging::DataSource::Ionosonde,
                    Some(code),
                    &format!("dropped at ingestion: {:?}", reason),
                );
            }
        }
    }
    (kept, dropped)
}

// ============================================================================
// Tests
// ============================================================================
