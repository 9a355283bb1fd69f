/// Request parameter parsing.
///
/// Clients send HamClock-style parameters either as a URL query string
/// (`TXLAT=40&TXLNG=-75&MHZ=14`) or as separate `KEY=VALUE` arguments.
/// Keys are case-insensitive; when a key repeats, the first value wins.
/// Missing parameters take their documented defaults; a parameter that is
/// present but unparseable is an `InvalidParameter` error.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::HashMap;

use crate::forecast::ForecastRequest;
use crate::geo::normalize_lon;
use crate::model::{GeoPoint, Mode, PathType, ServiceError};
use crate::render::bitmap::{MAP_HEIGHT, MAP_WIDTH};
use crate::render::{MapKind, MapRequest};

/// MODE default for the band forecast (CW).
pub const BAND_DEFAULT_MODE: u16 = 19;
/// MODE default for maps (SSB).
pub const MAP_DEFAULT_MODE: u16 = 38;

pub const DEFAULT_POWER_WATTS: f64 = 100.0;
pub const DEFAULT_TOA_DEG: f64 = 3.0;
pub const DEFAULT_MAP_MHZ: f64 = 14.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    params: HashMap<String, String>,
}

impl Query {
    /// Parses `A=1&B=2`. A leading `?` is ignored.
    pub fn from_query_string(qs: &str) -> Result<Self, ServiceError> {
        let qs = qs.trim().trim_start_matches('?');
        Self::from_pairs(qs.split('&').filter(|p| !p.is_empty()))
    }

    /// Parses `KEY=VALUE` arguments, tolerating a leading `--`.
    pub fn from_args<I, S>(args: I) -> Result<Self, ServiceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let owned: Vec<String> = args
            .into_iter()
            .map(|a| a.as_ref().trim_start_matches("--").to_string())
            .collect();
        Self::from_pairs(owned.iter().map(String::as_str))
    }

    fn from_pairs<'a>(pairs: impl Iterator<Item = &'a str>) -> Result<Self, ServiceError> {
        let mut params = HashMap::new();
        for pair in pairs {
            let (key, value) = pair.split_once('=').ok_or_else(|| ServiceError::InvalidParameter {
                name: pair.to_string(),
                value: String::new(),
            })?;
            let key = key.trim().to_ascii_uppercase();
            if key.is_empty() {
                return Err(ServiceError::InvalidParameter {
                    name: String::new(),
                    value: value.to_string(),
                });
            }
            params.entry(key).or_insert_with(|| value.trim().to_string());
        }
        Ok(Self { params })
    }

    /// Adds or replaces one parameter.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_ascii_uppercase(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(&key.to_ascii_uppercase()).map(String::as_str)
    }

    /// First present key among `keys`.
    pub fn get_any<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, &str)> {
        keys.iter().find_map(|k| self.get(k).map(|v| (*k, v)))
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ServiceError> {
        Ok(self.opt_f64(key)?.unwrap_or(default))
    }

    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, ServiceError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => parse_f64(key, raw).map(Some),
        }
    }

    pub fn i64_or(&self, key: &str, default: i64) -> Result<i64, ServiceError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<i64>()
                .or_else(|_| parse_f64(key, raw).map(|v| v.trunc() as i64))
                .map_err(|_| invalid(key, raw)),
        }
    }

    /// MODE as a numeric client code, or a mode name.
    pub fn mode_or(&self, default_code: u16) -> Result<Mode, ServiceError> {
        match self.get("MODE") {
            None => Ok(Mode::from_code(default_code)),
            Some(raw) => match raw.parse::<u16>() {
                Ok(code) => Ok(Mode::from_code(code)),
                Err(_) => Mode::from_name(raw).ok_or_else(|| invalid("MODE", raw)),
            },
        }
    }

    fn point(&self, lat_key: &str, lng_key: &str) -> Result<GeoPoint, ServiceError> {
        let lat = self.f64_or(lat_key, 0.0)?;
        let lng = self.f64_or(lng_key, 0.0)?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(invalid(lat_key, &lat.to_string()));
        }
        if !(-360.0..=360.0).contains(&lng) {
            return Err(invalid(lng_key, &lng.to_string()));
        }
        Ok(GeoPoint::new(lat, normalize_lon(lng)))
    }

    fn power(&self, keys: &[&str]) -> Result<f64, ServiceError> {
        let power = match self.get_any(keys) {
            Some((key, raw)) => parse_f64(key, raw)?,
            None => DEFAULT_POWER_WATTS,
        };
        if power < 0.0 {
            return Err(invalid(keys[0], &power.to_string()));
        }
        Ok(power)
    }

    fn month_year(&self, now: DateTime<Utc>) -> Result<(u32, i32), ServiceError> {
        let month = self.i64_or("MONTH", now.month() as i64)?;
        if !(1..=12).contains(&month) {
            return Err(invalid("MONTH", &month.to_string()));
        }
        let year = self.i64_or("YEAR", now.year() as i64)?;
        Ok((month as u32, year as i32))
    }

    /// Band forecast request. UTC is a whole hour, defaulting to now.
    pub fn forecast_request(&self, now: DateTime<Utc>) -> Result<ForecastRequest, ServiceError> {
        let utc = self.i64_or("UTC", now.hour() as i64)?;
        if !(0..=24).contains(&utc) {
            return Err(invalid("UTC", &utc.to_string()));
        }
        let (month, year) = self.month_year(now)?;
        Ok(ForecastRequest {
            tx: self.point("TXLAT", "TXLNG")?,
            rx: self.point("RXLAT", "RXLNG")?,
            mode: self.mode_or(BAND_DEFAULT_MODE)?,
            power_watts: self.power(&["POW", "POWER"])?,
            toa_deg: self.f64_or("TOA", DEFAULT_TOA_DEG)?,
            path: PathType::from_code(self.i64_or("PATH", 0)?),
            utc_hour: (utc % 24) as u32,
            month,
            year,
            ssn_override: self.opt_f64("SSN")?,
        })
    }

    /// Map request for `kind`. Size defaults to the native grid.
    pub fn map_request(&self, kind: MapKind, now: DateTime<Utc>) -> Result<MapRequest, ServiceError> {
        let utc = self.f64_or("UTC", now.hour() as f64)?;
        if !(0.0..=24.0).contains(&utc) {
            return Err(invalid("UTC", &utc.to_string()));
        }
        let (month, year) = self.month_year(now)?;
        let width = self.i64_or("WIDTH", MAP_WIDTH as i64)?;
        let height = self.i64_or("HEIGHT", MAP_HEIGHT as i64)?;
        if width <= 0 || width > u32::MAX as i64 {
            return Err(invalid("WIDTH", &width.to_string()));
        }
        if height <= 0 || height > u32::MAX as i64 {
            return Err(invalid("HEIGHT", &height.to_string()));
        }
        let freq_mhz = self.f64_or("MHZ", DEFAULT_MAP_MHZ)?;
        if freq_mhz < 0.0 {
            return Err(invalid("MHZ", &freq_mhz.to_string()));
        }

        Ok(MapRequest {
            tx: self.point("TXLAT", "TXLNG")?,
            freq_mhz,
            toa_deg: self.f64_or("TOA", DEFAULT_TOA_DEG)?,
            utc_hour: utc,
            month,
            year,
            mode: self.mode_or(MAP_DEFAULT_MODE)?,
            power_watts: self.power(&["WATTS", "POW", "POWER"])?,
            path: PathType::from_code(self.i64_or("PATH", 0)?),
            width: width as u32,
            height: height as u32,
            kind,
            ssn_override: self.opt_f64("SSN")?,
        })
    }
}

fn invalid(name: &str, value: &str) -> ServiceError {
    ServiceError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_f64(key: &str, raw: &str) -> Result<f64, ServiceError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(key, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 25, 0).unwrap()
    }

    #[test]
    fn test_query_string_and_args_agree() {
        let a = Query::from_query_string("?TXLAT=40&txlng=-75&MHZ=14").unwrap();
        let b = Query::from_args(["TXLAT=40", "--TXLNG=-75", "mhz=14"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get("txlat"), Some("40"));
    }

    #[test]
    fn test_first_value_wins() {
        let q = Query::from_query_string("MODE=13&MODE=38").unwrap();
        assert_eq!(q.mode_or(38).unwrap(), Mode::Ft8);
    }

    #[test]
    fn test_pair_without_equals_is_invalid() {
        assert!(matches!(
            Query::from_args(["TXLAT"]),
            Err(ServiceError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_forecast_defaults() {
        let req = Query::default().forecast_request(now()).unwrap();
        assert_eq!(req.mode, Mode::Cw);
        assert_eq!(req.power_watts, 100.0);
        assert_eq!(req.toa_deg, 3.0);
        assert_eq!(req.path, PathType::Short);
        assert_eq!(req.utc_hour, 13);
        assert_eq!((req.month, req.year), (5, 2024));
        assert_eq!(req.ssn_override, None);
    }

    #[test]
    fn test_power_alias() {
        let q = Query::from_args(["POWER=50"]).unwrap();
        assert_eq!(q.forecast_request(now()).unwrap().power_watts, 50.0);
        let q = Query::from_args(["WATTS=5", "POW=50"]).unwrap();
        assert_eq!(q.map_request(MapKind::Reliability, now()).unwrap().power_watts, 5.0);
    }

    #[test]
    fn test_map_defaults() {
        let req = Query::default().map_request(MapKind::Muf, now()).unwrap();
        assert_eq!(req.mode, Mode::Ssb);
        assert_eq!((req.width, req.height), (660, 330));
        assert_eq!(req.freq_mhz, 14.0);
        assert_eq!(req.utc_hour, 13.0);
    }

    #[test]
    fn test_unknown_mode_code_is_kept() {
        let q = Query::from_args(["MODE=7"]).unwrap();
        assert_eq!(q.mode_or(19).unwrap(), Mode::Other(7));
        let q = Query::from_args(["MODE=psk31"]).unwrap();
        assert_eq!(q.mode_or(19).unwrap(), Mode::Psk31);
        let q = Query::from_args(["MODE=olivia"]).unwrap();
        assert!(q.mode_or(19).is_err());
    }

    #[test]
    fn test_bad_numbers_are_rejected() {
        let q = Query::from_args(["TXLAT=north"]).unwrap();
        assert_eq!(
            q.forecast_request(now()).unwrap_err(),
            ServiceError::InvalidParameter { name: "TXLAT".into(), value: "north".into() }
        );
        let q = Query::from_args(["WIDTH=0"]).unwrap();
        assert!(q.map_request(MapKind::Reliability, now()).is_err());
        let q = Query::from_args(["TXLAT=91"]).unwrap();
        assert!(q.forecast_request(now()).is_err());
        let q = Query::from_args(["MHZ=NaN"]).unwrap();
        assert!(q.map_request(MapKind::Reliability, now()).is_err());
    }

    #[test]
    fn test_utc_24_wraps_to_zero() {
        let q = Query::from_args(["UTC=24"]).unwrap();
        assert_eq!(q.forecast_request(now()).unwrap().utc_hour, 0);
    }

    #[test]
    fn test_ssn_override_and_long_path() {
        let q = Query::from_args(["SSN=142", "PATH=1"]).unwrap();
        let req = q.forecast_request(now()).unwrap();
        assert_eq!(req.ssn_override, Some(142.0));
        assert_eq!(req.path, PathType::Long);
    }
}
