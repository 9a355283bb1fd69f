//! Per-cell sky-wave estimate used by the map renderer.
//!
//! For every receive cell the TX→RX chord is sampled at a quarter, half and
//! three quarters of its length. Each sample is projected back onto the
//! sphere and evaluated for solar illumination of the reflecting layer,
//! geomagnetic latitude and day/night transition. The weighted sample
//! MUFs and reliabilities give the cell value.

use std::f64::consts::PI;

use crate::geo::{EARTH_CIRCUMFERENCE_KM, EARTH_RADIUS_KM, SolarPosition, unit_vector, wrap_pi};
use crate::model::{GeoPoint, PathType};
use crate::propagation::path::{hop_penalty, muf_margin_factor, snr_reliability};

/// Geomagnetic north pole used for the dipole latitude.
const GEOMAG_POLE_LAT_DEG: f64 = 80.5;
const GEOMAG_POLE_LON_DEG: f64 = -72.5;

/// Height of the reflecting layer above the surface, km.
const LAYER_HEIGHT_KM: f64 = 350.0;

const SAMPLE_FRACTIONS: [f64; 3] = [0.25, 0.5, 0.75];
const SAMPLE_WEIGHTS: [f64; 3] = [0.25, 0.5, 0.25];

/// Smallest frequency fed to the frequency-dependent loss terms, MHz.
/// MUF maps request 0 MHz and only their MUF output is used.
const MIN_MODEL_MHZ: f64 = 0.1;

/// Inputs shared by every cell of one map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkywaveParams {
    pub tx: GeoPoint,
    pub freq_mhz: f64,
    /// Minimum takeoff angle, degrees.
    pub toa_deg: f64,
    pub sun: SolarPosition,
    pub ssn: f64,
    pub kp: f64,
    pub margin_db: f64,
    pub path: PathType,
}

/// Result for one receive cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellEstimate {
    pub muf_mhz: f64,
    /// 0.0–1.0
    pub reliability: f64,
    pub distance_km: f64,
}

/// Precomputed per-map terms; `evaluate` is then a pure function of the
/// receive cell.
#[derive(Debug, Clone)]
pub struct SkywaveModel {
    params: SkywaveParams,
    tx_lon: f64,
    sin_tx_lat: f64,
    cos_tx_lat: f64,
    v_tx: [f64; 3],
    sun_azimuth: f64,
    muf_base: f64,
    kp_factor: f64,
    muf_margin: f64,
    abs_margin: f64,
    model_mhz: f64,
    transition: f64,
    pole_lat: f64,
    pole_lon: f64,
}

impl SkywaveModel {
    pub fn new(params: SkywaveParams) -> Self {
        let tx_lat = params.tx.lat.to_radians();
        let tx_lon = params.tx.lon.to_radians();
        let (sin_tx_lat, cos_tx_lat) = tx_lat.sin_cos();
        let (sin_dec, cos_dec) = params.sun.declination.sin_cos();

        let d_sun = params.sun.longitude - tx_lon;
        let sun_azimuth = (d_sun.sin() * cos_dec)
            .atan2(cos_tx_lat * sin_dec - sin_tx_lat * cos_dec * d_sun.cos());

        let model_mhz = params.freq_mhz.max(MIN_MODEL_MHZ);

        Self {
            params,
            tx_lon,
            sin_tx_lat,
            cos_tx_lat,
            v_tx: unit_vector(tx_lat, tx_lon),
            sun_azimuth,
            muf_base: muf_base(params.ssn),
            kp_factor: kp_muf_factor(params.kp),
            muf_margin: muf_margin_factor(params.margin_db),
            abs_margin: 1.0 + params.margin_db * 0.008,
            model_mhz,
            transition: 1.0 / (1.0 + (model_mhz / 35.0).powi(2)),
            pole_lat: GEOMAG_POLE_LAT_DEG.to_radians(),
            pole_lon: GEOMAG_POLE_LON_DEG.to_radians(),
        }
    }

    pub fn params(&self) -> &SkywaveParams {
        &self.params
    }

    /// Evaluates the cell at `rx_lat`/`rx_lon` (radians).
    pub fn evaluate(&self, rx_lat: f64, rx_lon: f64) -> CellEstimate {
        let (sin_rx_lat, cos_rx_lat) = rx_lat.sin_cos();
        let d_lon = rx_lon - self.tx_lon;
        let cos_d_lon = d_lon.cos();

        let mut azimuth = (d_lon.sin() * cos_rx_lat)
            .atan2(self.cos_tx_lat * sin_rx_lat - self.sin_tx_lat * cos_rx_lat * cos_d_lon);
        let cos_c = (self.sin_tx_lat * sin_rx_lat + self.cos_tx_lat * cos_rx_lat * cos_d_lon)
            .clamp(-1.0, 1.0);
        let mut distance_km = cos_c.acos() * EARTH_RADIUS_KM;

        let long_path = self.params.path == PathType::Long;
        if long_path {
            distance_km = EARTH_CIRCUMFERENCE_KM - distance_km;
            azimuth = wrap_pi(azimuth + PI);
        }

        let rel_az = wrap_pi((azimuth - self.sun_azimuth).abs());
        let gray_tangent = 1.0 + 0.45 * (rel_az.abs() - PI / 2.0).cos().powi(4);
        let magnetic_az = 1.0 + 0.4 * azimuth.cos().powi(2);
        let combo = (gray_tangent + magnetic_az) / 2.0;
        let azimuth_layer = rel_az.cos().powi(2);

        let v_rx = unit_vector(rx_lat, rx_lon);
        let mut sum_muf = 0.0;
        let mut sum_rel = 0.0;
        for (frac, weight) in SAMPLE_FRACTIONS.iter().zip(SAMPLE_WEIGHTS.iter()) {
            let sample = self.sample_point(&v_rx, *frac, long_path);
            let (muf, rel) = self.evaluate_sample(sample, distance_km, combo, azimuth_layer);
            sum_muf += muf * weight;
            sum_rel += rel * weight;
        }

        CellEstimate {
            muf_mhz: sum_muf,
            reliability: sum_rel * hop_penalty(distance_km),
            distance_km,
        }
    }

    /// Latitude/longitude (radians) of the chord point at `frac`, pushed
    /// out to the sphere. Long paths use the antipodal point.
    fn sample_point(&self, v_rx: &[f64; 3], frac: f64, long_path: bool) -> (f64, f64) {
        let sign = if long_path { -1.0 } else { 1.0 };
        let v: [f64; 3] =
            std::array::from_fn(|i| sign * (self.v_tx[i] + (v_rx[i] - self.v_tx[i]) * frac));
        let mut mag = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if mag < 0.001 {
            mag = 1.0;
        }
        let lat = (v[2] / mag).clamp(-1.0, 1.0).asin();
        let lon = (v[1] / mag).atan2(v[0] / mag);
        (lat, lon)
    }

    /// MUF (MHz) and reliability (0–1) at one sample point.
    fn evaluate_sample(
        &self,
        (slat, slon): (f64, f64),
        distance_km: f64,
        combo: f64,
        azimuth_layer: f64,
    ) -> (f64, f64) {
        let p = &self.params;
        let mhz = self.model_mhz;
        let (sin_dec, cos_dec) = p.sun.declination.sin_cos();
        let (sin_slat, cos_slat) = slat.sin_cos();

        // Solar zenith at the sample and at the layer
        let cos_zenith = sin_slat * sin_dec + cos_slat * cos_dec * (slon - p.sun.longitude).cos();
        let zenith = cos_zenith.clamp(-1.0, 1.0).acos();
        let layer_ratio = EARTH_RADIUS_KM / (EARTH_RADIUS_KM + LAYER_HEIGHT_KM);
        let cos_layer = (layer_ratio * zenith.sin()).clamp(-1.0, 1.0).asin().cos();
        let zenith_layer = (cos_layer + 0.1).max(0.0).powf(0.75);

        // Geomagnetic latitude
        let s_mag = sin_slat * self.pole_lat.sin()
            + cos_slat * self.pole_lat.cos() * (slon - self.pole_lon).cos();
        let mag_lat = s_mag.clamp(-1.0, 1.0).asin();
        let mag_lat_deg = mag_lat.to_degrees();

        let dec = p.sun.declination;
        let is_polar = (dec < -0.1 && slat < -0.8) || (dec > 0.1 && slat > 0.8);

        let mut reflection = (0.4 + 0.6 * zenith_layer) * (0.8 + 0.2 * azimuth_layer);
        if cos_zenith <= -0.1 {
            let floor = if is_polar { 0.4 * (slat - dec).cos() } else { 0.25 };
            reflection = floor + (reflection - floor) * ((cos_zenith + 0.1) * 8.0).exp();
        }

        let refraction = 1.0
            + distance_km / 1000.0
                * (1.0 - cos_layer)
                * 0.045
                * combo
                * self.transition
                * (1.1 - 0.1 * azimuth_layer);

        let pca_loss = (-1.2 * mag_lat.sin().powi(4) * (20.0 / mhz).powf(1.5)).exp();
        let crest = |centre: f64| (-((mag_lat_deg - centre) / 6.5).powi(2)).exp();
        let bend = 0.85 + 0.65 * mag_lat.cos().powf(2.5) + 1.1 * (crest(15.5) + crest(-15.5));

        let sample_muf = self.muf_base * reflection * bend * self.kp_factor * self.muf_margin;

        // Reliability
        let terminator = 1.0 / (1.0 + (-35.0 * (cos_zenith + 0.04)).exp());
        let hop_len = 3100.0
            * (1.0 / (1.0 + p.toa_deg / 35.0))
            * (0.55 + 0.45 * (mhz / sample_muf.max(0.5)))
            * refraction;
        let resonance = 0.45
            + 3.4
                * ((PI * (distance_km / hop_len)).cos().powi(6)
                    + 0.55 * (PI * (distance_km / (hop_len * 1.35))).cos().powi(4));
        let elevation = (1800.0 / hop_len.max(20.0)).atan();
        let reflection_eff = (PI / 2.0 - elevation).cos().powf(0.3);
        let absorption =
            (-5.0 * terminator * zenith_layer * (10.0 / mhz).powf(2.2)).exp() * self.abs_margin;
        let path_loss = 1.0 / (1.0 + 0.000065 * distance_km * (1.0 / combo.max(0.2)));

        // Bz coupling is not modelled on maps; the margin is left as is.
        let snr_margin = (sample_muf / mhz)
            * resonance
            * absorption
            * reflection_eff
            * path_loss
            * pca_loss;

        (sample_muf, snr_reliability(snr_margin))
    }
}

/// Baseline MUF for maps, MHz.
pub fn muf_base(ssn: f64) -> f64 {
    5.0 + 0.1 * ssn
}

/// MUF depression during geomagnetic storms.
pub fn kp_muf_factor(kp: f64) -> f64 {
    (1.0 - (kp - 3.0).max(0.0) * 0.05).max(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(path: PathType) -> SkywaveParams {
        SkywaveParams {
            tx: GeoPoint::new(40.0, -75.0),
            freq_mhz: 14.0,
            toa_deg: 3.0,
            sun: SolarPosition::mid_month(5, 12.0),
            ssn: 100.0,
            kp: 3.0,
            margin_db: 0.0,
            path,
        }
    }

    fn rad(p: GeoPoint) -> (f64, f64) {
        (p.lat.to_radians(), p.lon.to_radians())
    }

    #[test]
    fn test_muf_base_and_kp_factor() {
        assert_eq!(muf_base(0.0), 5.0);
        assert_eq!(muf_base(100.0), 15.0);
        assert_eq!(kp_muf_factor(2.0), 1.0);
        assert!((kp_muf_factor(5.0) - 0.9).abs() < 1e-12);
        assert!((kp_muf_factor(9.0) - 0.7).abs() < 1e-12);
        assert_eq!(kp_muf_factor(20.0), 0.5);
    }

    #[test]
    fn test_cell_values_are_bounded_everywhere() {
        for path in [PathType::Short, PathType::Long] {
            let model = SkywaveModel::new(params(path));
            for lat in (-89..=89).step_by(7) {
                for lon in (-180..180).step_by(11) {
                    let (la, lo) = rad(GeoPoint::new(lat as f64, lon as f64));
                    let cell = model.evaluate(la, lo);
                    assert!(cell.muf_mhz.is_finite() && cell.muf_mhz >= 0.0);
                    assert!((0.0..=1.0).contains(&cell.reliability), "{:?}", cell);
                    assert!((0.0..=EARTH_CIRCUMFERENCE_KM).contains(&cell.distance_km));
                }
            }
        }
    }

    #[test]
    fn test_long_path_distance_is_complement() {
        let rx = GeoPoint::new(51.5, 0.0);
        let (la, lo) = rad(rx);
        let sp = SkywaveModel::new(params(PathType::Short)).evaluate(la, lo);
        let lp = SkywaveModel::new(params(PathType::Long)).evaluate(la, lo);
        assert!((sp.distance_km + lp.distance_km - EARTH_CIRCUMFERENCE_KM).abs() < 1e-6);
    }

    #[test]
    fn test_hop_penalty_applied_to_far_cells() {
        // A cell ~10,000 km away carries the 3-hop penalty
        let model = SkywaveModel::new(params(PathType::Short));
        let (la, lo) = rad(GeoPoint::new(-30.0, 20.0));
        let cell = model.evaluate(la, lo);
        assert!(cell.distance_km > 7000.0);
        assert!(cell.reliability <= hop_penalty(cell.distance_km) + 1e-12);
    }

    #[test]
    fn test_zero_mhz_still_yields_finite_muf() {
        let model = SkywaveModel::new(SkywaveParams { freq_mhz: 0.0, ..params(PathType::Short) });
        let (la, lo) = rad(GeoPoint::new(10.0, 10.0));
        let cell = model.evaluate(la, lo);
        assert!(cell.muf_mhz.is_finite());
        assert!(cell.reliability.is_finite());
    }

    #[test]
    fn test_storm_lowers_muf() {
        let quiet = SkywaveModel::new(params(PathType::Short));
        let storm = SkywaveModel::new(SkywaveParams { kp: 7.0, ..params(PathType::Short) });
        let (la, lo) = rad(GeoPoint::new(45.0, -40.0));
        assert!(storm.evaluate(la, lo).muf_mhz < quiet.evaluate(la, lo).muf_mhz);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let model = SkywaveModel::new(params(PathType::Short));
        let (la, lo) = rad(GeoPoint::new(33.3, 44.4));
        assert_eq!(model.evaluate(la, lo), model.evaluate(la, lo));
    }
}
