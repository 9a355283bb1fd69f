/// End-to-end tests for the request facade with offline collaborators
///
/// Tests verify:
/// 1. The reference path scenario yields a finite MUF and a valid fraction
/// 2. The band forecast text has the 26-line client layout
/// 3. A repeated map request is served from the cache without re-rendering
/// 4. Renders with identical inputs are bit-reproducible
/// 5. The station feed is fetched once per TTL, not once per request
/// 6. Bad parameters surface as a single InvalidParameter error
/// 7. The DE/DX summary lists the eight forecast bands
///
/// The ionosonde feed is replaced by a canned station list and space weather
/// by a fixed snapshot, so nothing here touches the network or the disk.
///
/// Run with: cargo test --test service_integration

use chrono::{DateTime, Duration, TimeZone, Utc};
use flate2::read::ZlibDecoder;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hfprop_service::cache::ResultCache;
use hfprop_service::freshness::ManualClock;
use hfprop_service::ingest::kc2g::{self, Kc2gRecord};
use hfprop_service::ingest::space_weather::FixedSpaceWeather;
use hfprop_service::ionosonde::{IonosondeStore, StationSource, StoreSettings};
use hfprop_service::model::{IngestError, ServiceError, SpaceWeatherSnapshot};
use hfprop_service::query::Query;
use hfprop_service::render::bitmap::BMP_HEADER_LEN;
use hfprop_service::render::{GridRenderer, MapKind};
use hfprop_service::service::PropagationService;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Two North Atlantic sounders, observed ten minutes before `fixed_now`.
const FEED: &str = r#"[
  {"cs": 95, "fof2": 8.1, "mufd": 24.5, "hmf2": 290, "md": 3.0,
   "time": "2024-05-01T11:50:00Z",
   "station": {"code": "SJJ18", "name": "Sao Jose", "latitude": "45.0", "longitude": "-35.0"}},
  {"cs": 80, "fof2": 7.4, "mufd": null, "md": 2.9,
   "time": "2024-05-01 11:50:00",
   "station": {"code": "RL052", "name": "Chilton", "latitude": 51.5, "longitude": 358.7}}
]"#;

/// Canned station feed that counts how often it is asked.
struct CannedFeed {
    calls: Arc<AtomicUsize>,
}

impl StationSource for CannedFeed {
    fn fetch_records(&self) -> Result<Vec<Kc2gRecord>, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        kc2g::parse_records(FEED)
    }
}

fn reference_weather() -> SpaceWeatherSnapshot {
    SpaceWeatherSnapshot {
        ssn: 100.0,
        kp: 3.0,
        ..SpaceWeatherSnapshot::default()
    }
}

struct Harness {
    service: PropagationService,
    clock: Arc<ManualClock>,
    feed_calls: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let feed_calls = Arc::new(AtomicUsize::new(0));
    let store = IonosondeStore::new(
        Box::new(CannedFeed {
            calls: feed_calls.clone(),
        }),
        clock.clone(),
        StoreSettings::default(),
    );
    let cache = ResultCache::new(clock.clone(), Duration::seconds(1800), 100);
    let service = PropagationService::new(
        store,
        Box::new(FixedSpaceWeather(reference_weather())),
        GridRenderer::default(),
        cache,
        clock.clone(),
    );
    Harness {
        service,
        clock,
        feed_calls,
    }
}

fn reference_path() -> Query {
    Query::from_args([
        "TXLAT=40.0",
        "TXLNG=-75.0",
        "RXLAT=51.5",
        "RXLNG=0.0",
        "UTC=12",
        "MODE=38",
        "POW=100",
    ])
    .unwrap()
}

fn inflate(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    ZlibDecoder::new(payload).read_to_end(&mut out).unwrap();
    out
}

// ---------------------------------------------------------------------------
// Single path
// ---------------------------------------------------------------------------

#[test]
fn test_reference_path_prediction() {
    let h = harness();
    let query = reference_path().with("MHZ", "14.0");

    let prediction = h.service.point(&query).unwrap();

    assert!(prediction.muf_mhz.is_finite());
    assert!(prediction.muf_mhz > 0.0);
    assert!((0.0..=1.0).contains(&prediction.reliability));
    assert!(prediction.distance_km > 5000.0 && prediction.distance_km < 6000.0);
}

#[test]
fn test_long_path_is_the_remaining_circumference() {
    let h = harness();
    let short = h.service.point(&reference_path()).unwrap();
    let long = h.service.point(&reference_path().with("PATH", "1")).unwrap();
    assert!((short.distance_km + long.distance_km - 40075.0).abs() < 1e-6);
    assert!(long.reliability <= 0.99);
}

#[test]
fn test_point_accepts_band_label() {
    let h = harness();
    let by_band = h.service.point(&reference_path().with("BAND", "20m")).unwrap();
    let by_mhz = h.service.point(&reference_path().with("MHZ", "14.0")).unwrap();
    assert_eq!(by_band, by_mhz);
    assert!(by_band.bearing_deg > 0.0 && by_band.bearing_deg < 90.0);

    let err = h.service.point(&reference_path().with("BAND", "11m")).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidParameter { .. }));
}

// ---------------------------------------------------------------------------
// Text forecast
// ---------------------------------------------------------------------------

#[test]
fn test_band_forecast_layout() {
    let h = harness();
    let text = h.service.band_conditions(&reference_path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 26);
    assert_eq!(lines[0].split(',').count(), 9);
    assert_eq!(lines[1], "100W,SSB,TOA>3,SP,S=100");

    let hours: Vec<&str> = lines[2..]
        .iter()
        .map(|l| l.split_once(' ').unwrap().0)
        .collect();
    let expected: Vec<String> = (1..24).chain([0]).map(|h| h.to_string()).collect();
    assert_eq!(hours, expected);

    for line in &lines[2..] {
        let values: Vec<f64> = line
            .split_once(' ')
            .unwrap()
            .1
            .split(',')
            .map(|v| v.parse().unwrap())
            .collect();
        assert_eq!(values.len(), 9);
        assert_eq!(values[8], 0.0, "placeholder column");
        assert!(values.iter().all(|v| (0.0..=0.99).contains(v)));
    }

    // Line 1 repeats the requested hour's row.
    assert_eq!(lines[0], lines[2 + 11].split_once(' ').unwrap().1);
}

#[test]
fn test_ssn_override_shows_in_descriptor() {
    let h = harness();
    let text = h
        .service
        .band_conditions(&reference_path().with("SSN", "42.7"))
        .unwrap();
    assert_eq!(text.lines().nth(1), Some("100W,SSB,TOA>3,SP,S=42"));
}

#[test]
fn test_band_summary_lists_forecast_bands() {
    let h = harness();
    let text = h.service.band_summary(&reference_path()).unwrap();
    let labels: Vec<&str> = text.lines().map(|l| l.split(',').next().unwrap()).collect();
    assert_eq!(labels, ["80m", "40m", "30m", "20m", "17m", "15m", "12m", "10m"]);
    assert!(!labels.contains(&"60m"));
    for line in text.lines() {
        let pct: u32 = line.split(',').nth(1).unwrap().parse().unwrap();
        assert!(pct <= 99);
    }
}

// ---------------------------------------------------------------------------
// Maps and the result cache
// ---------------------------------------------------------------------------

#[test]
fn test_repeat_map_request_is_a_cache_hit() {
    let h = harness();
    let query = reference_path().with("MHZ", "14");

    let first = h.service.map(&query, MapKind::Reliability).unwrap();
    h.clock.advance(Duration::minutes(10));
    let second = h.service.map(&query, MapKind::Reliability).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.payload, second.payload);
    let stats = h.service.cache_stats();
    assert_eq!(stats.misses, 1, "only the first request renders");
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[test]
fn test_expired_map_is_rendered_again() {
    let h = harness();
    let query = reference_path().with("MHZ", "7");

    let first = h.service.map(&query, MapKind::Reliability).unwrap();
    h.clock.advance(Duration::seconds(1800));
    let second = h.service.map(&query, MapKind::Reliability).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.payload, second.payload);
    assert_eq!(h.service.cache_stats().misses, 2);
}

#[test]
fn test_identical_renders_are_bit_reproducible() {
    let a = harness();
    let b = harness();
    let query = reference_path().with("MHZ", "21").with("WIDTH", "330").with("HEIGHT", "165");

    let left = a.service.map(&query, MapKind::Reliability).unwrap();
    let right = b.service.map(&query, MapKind::Reliability).unwrap();

    assert_eq!(left.fingerprint, right.fingerprint);
    assert_eq!(left.pixels, right.pixels);
    assert_eq!(left.payload, right.payload);
}

#[test]
fn test_map_payload_is_zlib_bmp() {
    let h = harness();
    let query = reference_path().with("WIDTH", "200").with("HEIGHT", "100");
    let map = h.service.map(&query, MapKind::Reliability).unwrap();

    let [day, night] = map.day_night();
    assert_eq!(day, night);

    let raw = inflate(day);
    assert_eq!(raw.len(), BMP_HEADER_LEN + 200 * 100 * 2);
    assert_eq!(&raw[0..2], b"BM");
}

#[test]
fn test_zero_mhz_selects_muf_map() {
    let h = harness();
    let query = reference_path().with("MHZ", "0");
    let map = h.service.map(&query, MapKind::Reliability).unwrap();
    assert_eq!(map.kind, MapKind::Muf);
    assert!(map.values.iter().all(|v| v.is_finite()));
}

#[test]
fn test_different_kinds_do_not_share_cache_entries() {
    let h = harness();
    let query = reference_path().with("WIDTH", "66").with("HEIGHT", "33");
    let rel = h.service.map(&query, MapKind::Reliability).unwrap();
    let toa = h.service.map(&query, MapKind::TakeoffAngle).unwrap();
    assert_ne!(rel.fingerprint, toa.fingerprint);
    assert_eq!(h.service.cache_stats().entries, 2);
}

// ---------------------------------------------------------------------------
// Station feed caching
// ---------------------------------------------------------------------------

#[test]
fn test_station_feed_fetched_once_per_ttl() {
    let h = harness();
    h.service.point(&reference_path()).unwrap();
    h.service.band_conditions(&reference_path()).unwrap();
    assert_eq!(h.feed_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.service.store().stations().len(), 2);

    h.clock.advance(Duration::minutes(11));
    h.service.point(&reference_path()).unwrap();
    assert_eq!(h.feed_calls.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn test_bad_parameter_is_reported_once() {
    let h = harness();
    let err = h
        .service
        .band_conditions(&reference_path().with("RXLAT", "ninety"))
        .unwrap_err();
    assert_eq!(
        err,
        ServiceError::InvalidParameter {
            name: "RXLAT".to_string(),
            value: "ninety".to_string(),
        }
    );
}

#[test]
fn test_oversized_map_is_a_render_error() {
    let h = harness();
    let query = reference_path().with("WIDTH", "5000");
    assert!(matches!(
        h.service.map(&query, MapKind::Reliability),
        Err(ServiceError::Render(_))
    ));
    assert_eq!(h.service.cache_stats().entries, 0);
}
