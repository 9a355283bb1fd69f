/// Property tests for the propagation model and station interpolation.
///
/// Tests verify:
/// 1. Interpolation coverage rules (no-coverage, direct, per-field IDW)
/// 2. Continuity of the reliability curve at every zone boundary
/// 3. Signal margin table and power scaling
/// 4. MUF distance scaling is continuous at 3000 km
/// 5. Reliability stays inside [0, 99] over a sweep of inputs
///
/// Everything here is offline and deterministic.
///
/// Run with: cargo test --test propagation_properties

use chrono::{TimeZone, Utc};

use hfprop_service::ionosonde::{StoreSettings, idw_weight, interpolate_at};
use hfprop_service::model::{GeoPoint, InterpolationMethod, Mode, Station};
use hfprop_service::propagation::path::{
    PathConditions, luf, muf, reliability, scale_muf_to_distance, signal_margin,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn station(code: &str, lat: f64, lon: f64, fof2: f64, mufd: Option<f64>, cs: f64) -> Station {
    Station {
        code: code.to_string(),
        name: format!("{} test sounder", code),
        lat,
        lon,
        fof2,
        mufd,
        hmf2: None,
        md: 3.0,
        confidence: cs,
        observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

fn midday_conditions() -> PathConditions {
    PathConditions {
        k_index: 1.0,
        distance_km: 2000.0,
        mid_lat: 40.0,
        mid_lon: 0.0,
        hour: 12.0,
        sfi: 150.0,
    }
}

fn assert_close(a: f64, b: f64, tol: f64, what: &str) {
    assert!((a - b).abs() <= tol, "{}: {} vs {} (tol {})", what, a, b, tol);
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

#[test]
fn test_nearest_beyond_3000_km_is_no_coverage() {
    let stations = vec![
        station("FAR1", -40.0, 150.0, 6.0, Some(18.0), 90.0),
        station("FAR2", -35.0, 140.0, 7.0, None, 80.0),
    ];
    let result = interpolate_at(&stations, GeoPoint::new(50.0, -10.0), &StoreSettings::default());
    assert_eq!(result.method, InterpolationMethod::NoCoverage);
    assert!(result.fof2.is_none());
    assert!(result.nearest.is_some());
}

#[test]
fn test_station_within_50_km_is_used_directly() {
    let mut close = station("NEAR", 51.5, -0.1, 6.4, None, 40.0);
    close.hmf2 = Some(280.0);
    close.md = 2.9;
    let stations = vec![close, station("OTHER", 52.5, 1.0, 9.9, Some(30.0), 100.0)];

    let result = interpolate_at(&stations, GeoPoint::new(51.5, 0.0), &StoreSettings::default());

    assert_eq!(result.method, InterpolationMethod::Direct);
    assert_eq!(result.fof2, Some(6.4));
    assert_eq!(result.mufd, None, "direct lookup must not borrow mufd from a neighbour");
    assert_eq!(result.hmf2, Some(280.0));
    assert_eq!(result.md, Some(2.9));
    assert_eq!(result.stations_used, 1);
}

#[test]
fn test_field_average_uses_only_reporting_neighbours() {
    let target = GeoPoint::new(45.0, 0.0);
    let a = station("A", 45.0, 3.0, 6.0, Some(20.0), 100.0);
    let b = station("B", 45.0, -5.0, 8.0, None, 100.0);
    let c = station("C", 48.0, 0.0, 7.0, Some(26.0), 50.0);
    let stations = vec![a.clone(), b.clone(), c.clone()];

    let result = interpolate_at(&stations, target, &StoreSettings::default());
    assert_eq!(result.method, InterpolationMethod::Interpolated);
    assert_eq!(result.stations_used, 3);

    let d = |s: &Station| hfprop_service::geo::haversine_km(target, GeoPoint::new(s.lat, s.lon));
    let (wa, wb, wc) = (
        idw_weight(a.confidence, d(&a)),
        idw_weight(b.confidence, d(&b)),
        idw_weight(c.confidence, d(&c)),
    );

    let expected_mufd = (20.0 * wa + 26.0 * wc) / (wa + wc);
    let expected_fof2 = (6.0 * wa + 8.0 * wb + 7.0 * wc) / (wa + wb + wc);
    assert_close(result.mufd.unwrap(), expected_mufd, 1e-9, "mufd");
    assert_close(result.fof2.unwrap(), expected_fof2, 1e-9, "fof2");

    // B's weight in the mufd denominator would drag the value towards zero.
    let diluted = (20.0 * wa + 26.0 * wc) / (wa + wb + wc);
    assert!(result.mufd.unwrap() > diluted + 1e-6);
}

// ---------------------------------------------------------------------------
// Reliability curve
// ---------------------------------------------------------------------------

#[test]
fn test_reliability_continuous_at_zone_boundaries() {
    // SSB at 100 W: zero margin, so effective MUF/LUF equal the inputs.
    let (path_muf, path_luf) = (20.0, 5.0);
    let margin = signal_margin(Mode::Ssb, 100.0);
    assert_eq!(margin, 0.0);
    let cond = midday_conditions();

    for boundary in [0.8 * path_luf, path_luf, path_muf, 1.1 * path_muf] {
        let eps = 1e-9;
        let below = reliability(boundary - eps, path_muf, path_luf, margin, &cond);
        let at = reliability(boundary, path_muf, path_luf, margin, &cond);
        let above = reliability(boundary + eps, path_muf, path_luf, margin, &cond);
        assert_close(below, at, 1e-6, &format!("below boundary {}", boundary));
        assert_close(above, at, 1e-6, &format!("above boundary {}", boundary));
    }
}

#[test]
fn test_reliability_always_within_bounds() {
    let freqs = [0.5, 1.8, 3.5, 7.0, 10.1, 14.0, 21.0, 28.0, 50.0, 144.0];
    let mufs = [0.0, 3.0, 12.0, 25.0, 60.0];
    let lufs = [0.0, 1.0, 4.0, 30.0];
    let margins = [-30.0, 0.0, 16.0, 45.0];
    let kps = [0.0, 3.0, 5.0, 9.0];
    let distances = [0.0, 1200.0, 7000.0, 20000.0, 40075.0];
    let lats = [-85.0, 0.0, 65.0];
    let hours = [0.0, 5.5, 12.0, 23.9];
    let sfis = [0.0, 70.0, 150.0, 300.0];

    let mut evaluated = 0usize;
    for &freq in &freqs {
        for &m in &mufs {
            for &l in &lufs {
                for &margin in &margins {
                    for &k in &kps {
                        for &d in &distances {
                            for &lat in &lats {
                                for &hour in &hours {
                                    for &sfi in &sfis {
                                        let cond = PathConditions {
                                            k_index: k,
                                            distance_km: d,
                                            mid_lat: lat,
                                            mid_lon: -60.0,
                                            hour,
                                            sfi,
                                        };
                                        let r = reliability(freq, m, l, margin, &cond);
                                        assert!(
                                            (0.0..=99.0).contains(&r),
                                            "reliability {} out of range for f={} muf={} luf={}",
                                            r, freq, m, l
                                        );
                                        evaluated += 1;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    assert!(evaluated > 100_000);
}

// ---------------------------------------------------------------------------
// Signal margin
// ---------------------------------------------------------------------------

#[test]
fn test_signal_margin_reference_values() {
    assert_eq!(signal_margin(Mode::Ssb, 100.0), 0.0);
    assert_eq!(signal_margin(Mode::Cw, 100.0), 16.0);
    let doubled = signal_margin(Mode::Ssb, 200.0) - signal_margin(Mode::Ssb, 100.0);
    assert_close(doubled, 10.0 * 2f64.log10(), 1e-12, "3 dB per doubling");
    assert_close(doubled, 3.01, 0.005, "approx 3.01 dB");
}

// ---------------------------------------------------------------------------
// MUF / LUF
// ---------------------------------------------------------------------------

#[test]
fn test_muf_continuous_at_3000_km() {
    for muf3000 in [8.0, 15.0, 32.5] {
        let short = scale_muf_to_distance(muf3000, 3000.0 - 1e-7);
        let long = scale_muf_to_distance(muf3000, 3000.0);
        assert_close(short, long, 1e-6, "distance scaling at 3000 km");
    }
    let below = muf(2999.9999, 45.0, 14.0, 100.0, None);
    let at = muf(3000.0, 45.0, 14.0, 100.0, None);
    assert_close(below, at, 1e-4, "muf() at 3000 km");
}

#[test]
fn test_luf_has_floor_of_one_mhz() {
    assert_eq!(luf(10.0, 2.0, 70.0, 0.0), 1.0);
    assert!(luf(6000.0, 12.0, 200.0, 5.0) > 1.0);
}
