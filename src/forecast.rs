/// Hour-by-band text forecast and the DE/DX band summary.
///
/// The forecast is the 26-line text block HamClock clients parse:
///
/// ```text
/// 0.12,0.45,0.80,0.91,0.77,0.52,0.20,0.05,0.00     <- requested hour
/// 100W,CW,TOA>3,SP,S=97                            <- descriptor
/// 1 0.10,0.40,...,0.00                             <- hours 1..23
/// ...
/// 0 0.11,0.42,...,0.00                             <- hour 0 last
/// ```
///
/// Each row carries one reliability per forecast band followed by a
/// placeholder column that is always 0.00.

use chrono::{DateTime, Timelike, Utc};

use crate::bands::{FORECAST_COLUMNS, forecast_bands};
use crate::ionosonde::IonosondeStore;
use crate::logging::{self, DataSource};
use crate::model::{GeoPoint, InterpolationResult, Mode, PathType, SpaceWeatherSnapshot};
use crate::propagation::path::{PathEnvironment, PathGeometry, evaluate_path, signal_margin};

/// One band-forecast request.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub tx: GeoPoint,
    pub rx: GeoPoint,
    pub mode: Mode,
    pub power_watts: f64,
    pub toa_deg: f64,
    pub path: PathType,
    /// Hour reported on line 1, 0–23.
    pub utc_hour: u32,
    pub month: u32,
    pub year: i32,
    pub ssn_override: Option<f64>,
}

/// A finished forecast, ready to print.
#[derive(Debug, Clone, PartialEq)]
pub struct BandForecast {
    /// Reliabilities (0–1) for the requested hour.
    pub current: Vec<f64>,
    pub descriptor: String,
    /// (hour, reliabilities) in client order: 1..23 then 0.
    pub rows: Vec<(u32, Vec<f64>)>,
}

impl BandForecast {
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format_row(&self.current));
        out.push('\n');
        out.push_str(&self.descriptor);
        out.push('\n');
        for (hour, values) in &self.rows {
            out.push_str(&format!("{} {}\n", hour, format_row(values)));
        }
        out
    }
}

/// Forecast hours in the order clients expect.
pub fn hour_order() -> impl Iterator<Item = u32> {
    (1..24).chain(std::iter::once(0))
}

fn format_row(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:.2}", v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Whole numbers print without a fractional part.
fn format_quantity(value: f64, precision: usize) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.*}", precision, value)
    }
}

/// Line 2: `{power}W,{mode},TOA>{toa},{SP|LP},S={ssn}`.
pub fn descriptor_line(request: &ForecastRequest, ssn: f64) -> String {
    format!(
        "{}W,{},TOA>{},{},S={}",
        format_quantity(request.power_watts, 1),
        request.mode,
        format_quantity(request.toa_deg, 1),
        request.path.label(),
        ssn.trunc() as i64
    )
}

/// Reliabilities (0–1) for every forecast column at one hour.
fn row_for_hour(
    geometry: &PathGeometry,
    iono: &InterpolationResult,
    margin_db: f64,
    env: &PathEnvironment,
    hour: u32,
) -> Vec<f64> {
    let mut row: Vec<f64> = forecast_bands()
        .iter()
        .map(|band| {
            let (_, rel) = evaluate_path(geometry, iono, band.mhz, hour as f64, margin_db, env);
            rel / 100.0
        })
        .collect();
    row.resize(FORECAST_COLUMNS, 0.0);
    row
}

/// Builds the full forecast. `current_hour` is the UTC hour the ionosonde
/// snapshot describes.
pub fn build_forecast(
    store: &IonosondeStore,
    swx: &SpaceWeatherSnapshot,
    request: &ForecastRequest,
    current_hour: f64,
) -> BandForecast {
    let ssn = request.ssn_override.unwrap_or(swx.ssn);
    let env = PathEnvironment {
        ssn,
        sfi: swx.sfi,
        k_index: swx.kp,
        current_hour,
    };
    let geometry = PathGeometry::new(request.tx, request.rx, request.path);
    let iono = store.interpolate(geometry.midpoint.lat, geometry.midpoint.lon);
    let margin = signal_margin(request.mode, request.power_watts);

    logging::debug(
        DataSource::Model,
        iono.nearest.as_ref().map(|n| n.code.as_str()),
        &format!(
            "{} path {:.0} km, midpoint ({:.2}, {:.2}) {} from {} stations",
            request.path.label(),
            geometry.distance_km,
            geometry.midpoint.lat,
            geometry.midpoint.lon,
            iono.method,
            iono.stations_used
        ),
    );

    BandForecast {
        current: row_for_hour(&geometry, &iono, margin, &env, request.utc_hour),
        descriptor: descriptor_line(request, ssn),
        rows: hour_order()
            .map(|h| (h, row_for_hour(&geometry, &iono, margin, &env, h)))
            .collect(),
    }
}

/// One line of the DE/DX summary.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSummaryEntry {
    pub label: &'static str,
    /// Whole-percent reliability.
    pub percent: u32,
}

/// Reliability right now between DE and DX on each forecast band (60m is
/// not listed), for a 100 W SSB signal on the short path.
pub fn band_summary(
    store: &IonosondeStore,
    swx: &SpaceWeatherSnapshot,
    de: GeoPoint,
    dx: GeoPoint,
    ssn: f64,
    now: DateTime<Utc>,
) -> Vec<BandSummaryEntry> {
    let hour = now.hour() as f64 + now.minute() as f64 / 60.0;
    let env = PathEnvironment {
        ssn,
        sfi: swx.sfi,
        k_index: swx.kp,
        current_hour: now.hour() as f64,
    };
    let geometry = PathGeometry::new(de, dx, PathType::Short);
    let iono = store.interpolate(geometry.midpoint.lat, geometry.midpoint.lon);
    let margin = signal_margin(Mode::Ssb, 100.0);

    forecast_bands()
        .into_iter()
        .map(|band| {
            let (_, rel) = evaluate_path(&geometry, &iono, band.mhz, hour, margin, &env);
            BandSummaryEntry {
                label: band.label,
                percent: rel.trunc().clamp(0.0, 100.0) as u32,
            }
        })
        .collect()
}

/// `label,percent` lines.
pub fn format_summary(entries: &[BandSummaryEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{},{}\n", e.label, e.percent))
        .collect()
}
