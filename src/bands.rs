/// Amateur HF band registry.
///
/// Defines the canonical list of bands the service forecasts, with the
/// frequency each one is evaluated at. This is the single source of truth
/// for band frequencies. The text forecast and the DE/DX summary both read
/// from here rather than hardcoding MHz values.

// ---------------------------------------------------------------------------
// Band metadata
// ---------------------------------------------------------------------------

/// One amateur band.
#[derive(Debug)]
pub struct Band {
    /// Conventional wavelength label, e.g. "20m".
    pub label: &'static str,
    /// Frequency the model is evaluated at, MHz.
    pub mhz: f64,
    /// Whether the band appears as a column in the HamClock text forecast.
    pub forecast_column: bool,
}

/// HF bands ordered by frequency.
///
/// 60 m is evaluated for the DE/DX summary but is not one of the eight
/// forecast columns the client expects.
pub static BAND_REGISTRY: &[Band] = &[
    Band { label: "80m", mhz: 3.5, forecast_column: true },
    Band { label: "60m", mhz: 5.3, forecast_column: false },
    Band { label: "40m", mhz: 7.0, forecast_column: true },
    Band { label: "30m", mhz: 10.1, forecast_column: true },
    Band { label: "20m", mhz: 14.0, forecast_column: true },
    Band { label: "17m", mhz: 18.1, forecast_column: true },
    Band { label: "15m", mhz: 21.0, forecast_column: true },
    Band { label: "12m", mhz: 24.9, forecast_column: true },
    Band { label: "10m", mhz: 28.0, forecast_column: true },
];

/// Total columns in a forecast row: the eight bands plus a trailing
/// placeholder that is always 0.00.
pub const FORECAST_COLUMNS: usize = 9;

/// Bands that appear as forecast columns, in column order.
pub fn forecast_bands() -> Vec<&'static Band> {
    BAND_REGISTRY.iter().filter(|b| b.forecast_column).collect()
}

/// Looks up a band by label. Returns `None` if not found.
pub fn find_band(label: &str) -> Option<&'static Band> {
    BAND_REGISTRY.iter().find(|b| b.label == label)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
