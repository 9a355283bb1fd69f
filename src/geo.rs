/// Great-circle geometry and solar position.
///
/// Angles are degrees at the API boundary and radians inside the
/// trigonometry.

use crate::model::GeoPoint;
use std::f64::consts::PI;

/// Mean Earth radius used throughout, km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Equatorial circumference used for long-path distances, km.
pub const EARTH_CIRCUMFERENCE_KM: f64 = 40075.0;

/// Haversine distance between two points, km.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).max(0.0).sqrt())
}

/// Normalises a longitude into [-180, 180]. Non-finite input comes back
/// as NaN.
pub fn normalize_lon(lon: f64) -> f64 {
    if !lon.is_finite() {
        return f64::NAN;
    }
    if (-180.0..=180.0).contains(&lon) {
        return lon;
    }
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Path midpoint as the arithmetic mean of the endpoints, with the
/// longitude taken the short way round when the path crosses the
/// antimeridian.
pub fn path_midpoint(tx: GeoPoint, rx: GeoPoint) -> GeoPoint {
    let lat = (tx.lat + rx.lat) / 2.0;
    let mut lon = (tx.lon + rx.lon) / 2.0;
    if (tx.lon - rx.lon).abs() > 180.0 {
        lon = (tx.lon + rx.lon + 360.0) / 2.0;
        if lon > 180.0 {
            lon -= 360.0;
        }
    }
    GeoPoint::new(lat, lon)
}

/// The point diametrically opposite `p`.
pub fn antipode(p: GeoPoint) -> GeoPoint {
    GeoPoint::new(-p.lat, normalize_lon(p.lon + 180.0))
}

/// Initial bearing from `from` to `to`, radians in (-π, π], north = 0,
/// east positive.
pub fn initial_bearing(from: GeoPoint, to: GeoPoint) -> f64 {
    let (lat1, lat2) = (from.lat.to_radians(), to.lat.to_radians());
    let dlon = (to.lon - from.lon).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    y.atan2(x)
}

/// Wraps an angle into [-π, π).
pub fn wrap_pi(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Sub-solar point for a month/day and UTC hour.
///
/// Declination uses the single-harmonic approximation
/// `23.44·sin(360/365.25·(doy − 81))`; longitude ignores the equation of
/// time. Good to about a degree, which is plenty for terminator shading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    /// Declination, radians.
    pub declination: f64,
    /// Sub-solar longitude, radians.
    pub longitude: f64,
}

const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

impl SolarPosition {
    pub fn at(month: u32, day: u32, utc_hour: f64) -> Self {
        let month_index = month.clamp(1, 12) as usize;
        let doy: u32 = DAYS_IN_MONTH[..month_index - 1].iter().sum::<u32>() + day;
        let declination = 23.44 * (360.0 / 365.25 * (doy as f64 - 81.0)).to_radians().sin();
        let sub_lng = (12.0 - utc_hour) * 15.0;
        Self {
            declination: declination.to_radians(),
            longitude: sub_lng.to_radians(),
        }
    }

    /// Mid-month position, which is what map renders use.
    pub fn mid_month(month: u32, utc_hour: f64) -> Self {
        Self::at(month, 15, utc_hour)
    }
}

/// Unit vector on the sphere for a latitude/longitude in radians.
pub fn unit_vector(lat_rad: f64, lon_rad: f64) -> [f64; 3] {
    let c = lat_rad.cos();
    [c * lon_rad.cos(), c * lon_rad.sin(), lat_rad.sin()]
}
