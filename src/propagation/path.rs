//! Single-path HF propagation model.
//!
//! Empirical MUF/LUF estimates and a piecewise reliability curve around the
//! optimum working frequency, followed by multiplicative penalties for
//! geomagnetic storms, hop count, high latitude, low solar flux and time of
//! day. Every function here is pure; the grid renderer reuses the shared
//! pieces (`signal_margin`, `muf_margin_factor`, `hop_penalty`).

use std::f64::consts::PI;

use crate::geo::{
    EARTH_CIRCUMFERENCE_KM, antipode, haversine_km, initial_bearing, path_midpoint, wrap_pi,
};
use crate::ionosonde::IonosondeStore;
use crate::model::{
    GeoPoint, InterpolationMethod, InterpolationResult, Mode, PathQuery, PathType, PointPrediction,
};

/// Reference path length for MUF(3000), km.
const MUF_REFERENCE_KM: f64 = 3000.0;

/// Length of one F2 hop, km.
const HOP_LENGTH_KM: f64 = 3500.0;

/// Position of the optimum working frequency inside the LUF–MUF window.
const OWF_POSITION: f64 = 0.75;

/// Hard ceiling on reported reliability, percent.
const MAX_RELIABILITY: f64 = 99.0;

// ---------------------------------------------------------------------------
// Signal margin
// ---------------------------------------------------------------------------

/// dB margin over a 100 W SSB signal.
pub fn signal_margin(mode: Mode, power_watts: f64) -> f64 {
    let power = power_watts.max(0.01);
    mode.advantage_db() + 10.0 * (power / 100.0).log10()
}

/// How much a signal margin stretches the usable MUF.
pub fn muf_margin_factor(margin_db: f64) -> f64 {
    1.0 + 0.012 * margin_db
}

/// How much a signal margin pulls the LUF down.
pub fn luf_margin_factor(margin_db: f64) -> f64 {
    (1.0 - 0.008 * margin_db).max(0.1)
}

// ---------------------------------------------------------------------------
// MUF / LUF
// ---------------------------------------------------------------------------

/// Diurnal foF2 variation, peaking at 14 UTC.
pub fn hour_factor(hour: f64) -> f64 {
    1.0 + 0.4 * ((hour - 14.0) * PI / 12.0).cos()
}

/// MUF(3000) from solar activity alone, for paths without ionosonde cover.
pub fn solar_muf3000(ssn: f64, mid_lat: f64, hour: f64) -> f64 {
    let lat_factor = 1.0 - mid_lat.abs() / 150.0;
    let fof2_estimate = 0.9 * (ssn + 15.0).max(0.0).sqrt() * hour_factor(hour) * lat_factor;
    fof2_estimate * 3.0
}

/// MUF(3000) preferring measured mufd, then foF2·M(3000), then the solar
/// model.
pub fn resolve_muf3000(
    mid_lat: f64,
    hour: f64,
    ssn: f64,
    iono: Option<&InterpolationResult>,
) -> f64 {
    if let Some(result) = iono {
        if let Some(mufd) = result.mufd.filter(|v| *v > 0.0) {
            return mufd;
        }
        if let Some(fof2) = result.fof2.filter(|v| *v > 0.0) {
            return fof2 * result.md.unwrap_or(3.0);
        }
    }
    solar_muf3000(ssn, mid_lat, hour)
}

/// Scales MUF(3000) to a path of `distance_km`.
///
/// Both branches give exactly `muf3000` at 3000 km.
pub fn scale_muf_to_distance(muf3000: f64, distance_km: f64) -> f64 {
    if distance_km < MUF_REFERENCE_KM {
        muf3000 * (distance_km.max(0.0) / MUF_REFERENCE_KM).sqrt()
    } else {
        muf3000 * (1.0 + 0.15 * (distance_km / MUF_REFERENCE_KM).log10())
    }
}

/// Path MUF, MHz.
pub fn muf(
    distance_km: f64,
    mid_lat: f64,
    hour: f64,
    ssn: f64,
    iono: Option<&InterpolationResult>,
) -> f64 {
    scale_muf_to_distance(resolve_muf3000(mid_lat, hour, ssn, iono), distance_km)
}

/// Path LUF, MHz. Never below 1 MHz.
pub fn luf(distance_km: f64, hour: f64, sfi: f64, k_index: f64) -> f64 {
    let path_factor = (distance_km.max(0.0) / 1000.0).sqrt();
    let solar_factor = sfi.max(0.0).sqrt();
    let zenith = ((hour - 12.0).abs() * 15.0).to_radians();
    let diurnal = zenith.cos().max(0.1).sqrt();
    let storm = 1.0 + 0.1 * k_index;

    let mut base = 2.0 * path_factor * solar_factor * diurnal * storm / 10.0;
    if hour < 6.0 || hour > 18.0 {
        base *= 0.3;
    }
    base.max(1.0)
}

// ---------------------------------------------------------------------------
// Reliability
// ---------------------------------------------------------------------------

/// Path and space-weather context for `reliability`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathConditions {
    pub k_index: f64,
    pub distance_km: f64,
    pub mid_lat: f64,
    pub mid_lon: f64,
    /// UTC hour.
    pub hour: f64,
    pub sfi: f64,
}

/// Base reliability (percent) from where `freq` sits relative to the
/// effective LUF and MUF.
///
/// Five zones, continuous at each boundary:
///   far above MUF, just above MUF, far below LUF, just below LUF, and the
///   usable window, which peaks at 95 at the optimum working frequency.
pub fn window_reliability(freq: f64, eff_muf: f64, eff_luf: f64) -> f64 {
    if freq > eff_muf * 1.1 {
        (30.0 - (freq - eff_muf * 1.1) * 5.0).max(0.0)
    } else if freq > eff_muf {
        30.0 + (eff_muf * 1.1 - freq) / (eff_muf * 0.1) * 20.0
    } else if freq < eff_luf * 0.8 {
        (20.0 - (eff_luf * 0.8 - freq) * 10.0).max(0.0)
    } else if freq < eff_luf {
        20.0 + (freq - eff_luf * 0.8) / (eff_luf * 0.2) * 30.0
    } else {
        let range = eff_muf - eff_luf;
        if range <= 0.0 {
            return 30.0;
        }
        let position = (freq - eff_luf) / range;
        if position < OWF_POSITION {
            50.0 + position / OWF_POSITION * 45.0
        } else {
            95.0 - (position - OWF_POSITION) / (1.0 - OWF_POSITION) * 45.0
        }
    }
}

/// Geomagnetic storm multiplier from Kp.
pub fn kp_penalty(k_index: f64) -> f64 {
    if k_index >= 7.0 {
        0.1
    } else if k_index >= 6.0 {
        0.2
    } else if k_index >= 5.0 {
        0.4
    } else if k_index >= 4.0 {
        0.6
    } else if k_index >= 3.0 {
        0.8
    } else {
        1.0
    }
}

/// Number of F2 hops for a path.
pub fn hop_count(distance_km: f64) -> u32 {
    (distance_km.max(0.0) / HOP_LENGTH_KM).ceil() as u32
}

/// Multi-hop loss: 0.92 per hop beyond the first.
pub fn hop_penalty(distance_km: f64) -> f64 {
    let hops = hop_count(distance_km);
    if hops > 1 {
        0.92f64.powi(hops as i32 - 1)
    } else {
        1.0
    }
}

/// Auroral-zone loss for paths reflecting poleward of 60°.
pub fn high_latitude_penalty(mid_lat: f64, k_index: f64) -> f64 {
    if mid_lat.abs() <= 60.0 {
        return 1.0;
    }
    if k_index >= 3.0 { 0.7 * 0.7 } else { 0.7 }
}

/// Upper HF and 6 m need flux; penalise quiet-sun conditions.
pub fn solar_flux_penalty(freq: f64, sfi: f64) -> f64 {
    let mut factor = 1.0;
    if freq >= 21.0 && sfi < 100.0 {
        factor *= (sfi.max(0.0) / 100.0).sqrt();
    }
    if freq >= 28.0 && sfi < 120.0 {
        factor *= (sfi.max(0.0) / 120.0).sqrt();
    }
    if freq >= 50.0 && sfi < 150.0 {
        factor *= (sfi.max(0.0) / 150.0).powf(1.5);
    }
    factor
}

/// Local solar hour at the path midpoint.
pub fn local_hour(utc_hour: f64, mid_lon: f64) -> f64 {
    (utc_hour + mid_lon / 15.0 + 24.0).rem_euclid(24.0)
}

/// Low bands improve at night and suffer D-layer absorption by day.
pub fn day_night_factor(freq: f64, utc_hour: f64, mid_lon: f64) -> f64 {
    let lh = local_hour(utc_hour, mid_lon);
    let is_night = !(6.0..=18.0).contains(&lh);
    let mut factor = 1.0;
    if freq <= 7.0 && is_night {
        factor *= 1.1;
    }
    if freq <= 3.5 && !is_night {
        factor *= 0.7;
    }
    factor
}

/// Reliability in percent, clipped to [0, 99].
pub fn reliability(
    freq: f64,
    muf: f64,
    luf: f64,
    margin_db: f64,
    conditions: &PathConditions,
) -> f64 {
    let eff_muf = muf * muf_margin_factor(margin_db);
    let eff_luf = luf * luf_margin_factor(margin_db);

    let base = window_reliability(freq, eff_muf, eff_luf);
    let rel = base
        * kp_penalty(conditions.k_index)
        * hop_penalty(conditions.distance_km)
        * high_latitude_penalty(conditions.mid_lat, conditions.k_index)
        * solar_flux_penalty(freq, conditions.sfi)
        * day_night_factor(freq, conditions.hour, conditions.mid_lon);

    if rel.is_nan() {
        return 0.0;
    }
    rel.clamp(0.0, MAX_RELIABILITY)
}

/// Rough SNR label for a reliability percentage.
pub fn snr_label(reliability_pct: f64) -> &'static str {
    if reliability_pct >= 80.0 {
        "+20dB"
    } else if reliability_pct >= 60.0 {
        "+10dB"
    } else if reliability_pct >= 40.0 {
        "0dB"
    } else if reliability_pct >= 20.0 {
        "-10dB"
    } else {
        "-20dB"
    }
}

/// Logistic map from a normalised SNR margin to a 0–1 reliability. Margin
/// 0.70 is the 50 % point.
pub fn snr_reliability(snr_margin: f64) -> f64 {
    let exponent = (-25.0 * (snr_margin - 0.70)).clamp(-50.0, 50.0);
    1.0 / (1.0 + exponent.exp())
}

// ---------------------------------------------------------------------------
// Path geometry and point prediction
// ---------------------------------------------------------------------------

/// Distance and reflection midpoint for a TX/RX pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathGeometry {
    pub distance_km: f64,
    pub midpoint: GeoPoint,
    /// Initial beam heading from TX, radians, north = 0.
    pub bearing: f64,
}

impl PathGeometry {
    /// Long paths go the other way round: the distance is the remainder of
    /// the circumference and the reflection midpoint is the antipode of the
    /// short-path midpoint.
    pub fn new(tx: GeoPoint, rx: GeoPoint, path: PathType) -> Self {
        let short_km = haversine_km(tx, rx);
        let short_mid = path_midpoint(tx, rx);
        let short_bearing = initial_bearing(tx, rx);
        match path {
            PathType::Short => Self {
                distance_km: short_km,
                midpoint: short_mid,
                bearing: short_bearing,
            },
            PathType::Long => Self {
                distance_km: EARTH_CIRCUMFERENCE_KM - short_km,
                midpoint: antipode(short_mid),
                bearing: wrap_pi(short_bearing + PI),
            },
        }
    }
}

/// Moves ionosonde values measured at `measured_hour` to `target_hour`
/// using the diurnal `hour_factor` ratio.
pub fn scale_to_hour(
    iono: &InterpolationResult,
    measured_hour: f64,
    target_hour: f64,
) -> InterpolationResult {
    if !iono.has_coverage() || (measured_hour - target_hour).abs() < f64::EPSILON {
        return iono.clone();
    }
    let ratio = hour_factor(target_hour) / hour_factor(measured_hour);
    InterpolationResult {
        fof2: iono.fof2.map(|v| v * ratio),
        mufd: iono.mufd.map(|v| v * ratio),
        ..iono.clone()
    }
}

/// Space weather and clock context for a single-path evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathEnvironment {
    pub ssn: f64,
    pub sfi: f64,
    pub k_index: f64,
    /// UTC hour the ionosonde snapshot describes.
    pub current_hour: f64,
}

/// Evaluates one frequency/hour on a path whose geometry and ionosonde
/// estimate are already known. Returns (MUF MHz, reliability percent).
pub fn evaluate_path(
    geometry: &PathGeometry,
    iono: &InterpolationResult,
    freq: f64,
    hour: f64,
    margin_db: f64,
    env: &PathEnvironment,
) -> (f64, f64) {
    let iono_now = scale_to_hour(iono, env.current_hour, hour);
    let iono_ref = if iono_now.has_coverage() { Some(&iono_now) } else { None };

    let mid = geometry.midpoint;
    let path_muf = muf(geometry.distance_km, mid.lat, hour, env.ssn, iono_ref);
    let path_luf = luf(geometry.distance_km, hour, env.sfi, env.k_index);
    let conditions = PathConditions {
        k_index: env.k_index,
        distance_km: geometry.distance_km,
        mid_lat: mid.lat,
        mid_lon: mid.lon,
        hour,
        sfi: env.sfi,
    };
    let rel = reliability(freq, path_muf, path_luf, margin_db, &conditions);
    (path_muf, rel)
}

/// Full single-path prediction: geometry, ionosonde lookup at the
/// midpoint, margin, MUF and reliability.
pub fn point_propagation(
    store: &IonosondeStore,
    query: &PathQuery,
    env: &PathEnvironment,
) -> PointPrediction {
    let geometry = PathGeometry::new(query.tx, query.rx, query.path);
    let iono = store.interpolate(geometry.midpoint.lat, geometry.midpoint.lon);
    let margin = signal_margin(query.mode, query.power_watts);
    let (path_muf, rel) = evaluate_path(&geometry, &iono, query.freq_mhz, query.utc_hour, margin, env);

    PointPrediction {
        muf_mhz: path_muf,
        reliability: rel / 100.0,
        distance_km: geometry.distance_km,
        bearing_deg: geometry.bearing.to_degrees().rem_euclid(360.0),
        midpoint: geometry.midpoint,
        method: iono.method,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
