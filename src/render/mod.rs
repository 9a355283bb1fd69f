//! World map renderer.
//!
//! Applies the sky-wave model to every cell of the native 660×330 grid,
//! smooths and dithers the values, colours them through a lookup table,
//! composites over the background layer and packs the result as a
//! zlib-compressed 16-bit BMP.
//!
//! Submodules:
//! - `grid`: native axes, per-cell evaluation, smoothing, dither
//! - `colormap`: lazily built RGB565 lookup tables
//! - `bitmap`: BMP header, blending, resampling, compression, base layers

pub mod bitmap;
pub mod colormap;
pub mod grid;

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Instant;

use crate::geo::SolarPosition;
use crate::logging::{self, DataSource};
use crate::model::{GeoPoint, Mode, PathType, ServiceError, SpaceWeatherSnapshot};
use crate::propagation::path::signal_margin;
use crate::propagation::skywave::{SkywaveModel, SkywaveParams};

use bitmap::{BaseMaps, MAP_HEIGHT, MAP_WIDTH};
use colormap::{MUF_LUT, RELIABILITY_LUT, TOA_LUT, VOID_COLOR, lookup};

/// Largest accepted output dimension, pixels.
pub const MAX_OUTPUT_DIM: u32 = 4096;

/// Upper end of the MUF colour scale, MHz.
const MUF_CLIP_MHZ: f64 = 50.0;

/// MUF at which the overlay reaches full strength, MHz.
const MUF_FULL_STRENGTH_MHZ: f64 = 35.0;

/// Reliability (percent, after quantisation) at or below which the
/// takeoff-angle map shows the void colour.
const TOA_MIN_RELIABILITY: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKind {
    Reliability,
    Muf,
    TakeoffAngle,
}

impl MapKind {
    pub fn label(&self) -> &'static str {
        match self {
            MapKind::Reliability => "REL",
            MapKind::Muf => "MUF",
            MapKind::TakeoffAngle => "TOA",
        }
    }
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Everything that determines one map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRequest {
    pub tx: GeoPoint,
    /// 0 selects the MUF map regardless of `kind`.
    pub freq_mhz: f64,
    pub toa_deg: f64,
    pub utc_hour: f64,
    pub month: u32,
    pub year: i32,
    pub mode: Mode,
    pub power_watts: f64,
    pub path: PathType,
    pub width: u32,
    pub height: u32,
    pub kind: MapKind,
    pub ssn_override: Option<f64>,
}

impl MapRequest {
    /// The kind actually drawn: a 0 MHz request is always a MUF map.
    pub fn effective_kind(&self) -> MapKind {
        if self.freq_mhz == 0.0 { MapKind::Muf } else { self.kind }
    }

    /// Canonical text of every input that affects the rendered bytes.
    pub fn canonical_key(&self, swx: &SpaceWeatherSnapshot) -> String {
        let ssn = self
            .ssn_override
            .map(|s| format!("{:.1}", s))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "tx={:.4},{:.4};res={}x{};mhz={:.3};utc={:.3};month={};year={};mode={};pow={:.2};path={};toa={:.2};kind={};ssn={};{}",
            self.tx.lat,
            self.tx.lon,
            self.width,
            self.height,
            self.freq_mhz,
            self.utc_hour,
            self.month,
            self.year,
            self.mode,
            self.power_watts,
            self.path.label(),
            self.toa_deg,
            self.effective_kind(),
            ssn,
            swx.identity(),
        )
    }
}

/// One finished map. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMap {
    pub kind: MapKind,
    pub width: u32,
    pub height: u32,
    /// Quantised values at native resolution, row-major.
    pub values: Vec<f64>,
    /// RGB565 pixels at output resolution, row-major top-down.
    pub pixels: Vec<u16>,
    /// zlib(BMP header + pixels).
    pub payload: Vec<u8>,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl RenderedMap {
    /// Day and night buffers. Both are the same image.
    pub fn day_night(&self) -> [&[u8]; 2] {
        [self.payload.as_slice(), self.payload.as_slice()]
    }
}

/// Renders maps over a fixed set of background layers.
#[derive(Debug, Clone, Default)]
pub struct GridRenderer {
    base_maps: BaseMaps,
}

impl GridRenderer {
    pub fn new(base_maps: BaseMaps) -> Self {
        Self { base_maps }
    }

    pub fn base_maps(&self) -> &BaseMaps {
        &self.base_maps
    }

    pub fn render(
        &self,
        request: &MapRequest,
        swx: &SpaceWeatherSnapshot,
        fingerprint: String,
        now: DateTime<Utc>,
    ) -> Result<RenderedMap, ServiceError> {
        if request.width == 0
            || request.height == 0
            || request.width > MAX_OUTPUT_DIM
            || request.height > MAX_OUTPUT_DIM
        {
            return Err(ServiceError::Render(format!(
                "unsupported output size {}x{}",
                request.width, request.height
            )));
        }

        let started = Instant::now();
        let kind = request.effective_kind();
        let model = SkywaveModel::new(SkywaveParams {
            tx: request.tx,
            freq_mhz: request.freq_mhz,
            toa_deg: request.toa_deg,
            sun: SolarPosition::mid_month(request.month, request.utc_hour),
            ssn: request.ssn_override.unwrap_or(swx.ssn),
            kp: swx.kp,
            margin_db: signal_margin(request.mode, request.power_watts),
            path: request.path,
        });

        let cells = grid::evaluate_grid(&model);
        let raw: Vec<f64> = match kind {
            MapKind::Muf => cells.iter().map(|c| c.muf_mhz).collect(),
            _ => cells.iter().map(|c| c.reliability).collect(),
        };
        let smoothed = grid::smooth_cross(&raw, MAP_WIDTH, MAP_HEIGHT);

        let mut values = Vec::with_capacity(smoothed.len());
        let mut native = Vec::with_capacity(smoothed.len());
        for (i, value) in smoothed.iter().enumerate() {
            let (x, y) = (i % MAP_WIDTH, i / MAP_WIDTH);
            let cell = colorize(kind, *value, grid::dither(x, y), cells[i].distance_km);
            values.push(cell.value);
            native.push(self.composite(i, cell.color, cell.strength));
        }

        let (w, h) = (request.width as usize, request.height as usize);
        let pixels = bitmap::resample_nearest(&native, MAP_WIDTH, MAP_HEIGHT, w, h);
        let payload = bitmap::encode_bmp565_zlib(request.width, request.height, &pixels)?;

        logging::debug(
            DataSource::Render,
            None,
            &format!(
                "{} map {}x{} rendered in {} ms ({} bytes)",
                kind,
                request.width,
                request.height,
                started.elapsed().as_millis(),
                payload.len()
            ),
        );

        Ok(RenderedMap {
            kind,
            width: request.width,
            height: request.height,
            values,
            pixels,
            payload,
            fingerprint,
            created_at: now,
        })
    }

    fn composite(&self, index: usize, color: u16, strength: f64) -> u16 {
        let mut out = color;
        if let Some(bg) = self.base_maps.background() {
            out = bitmap::blend_rgb565(out, bg[index], 0.4 + 0.4 * strength);
        }
        if let Some(mask) = &self.base_maps.mask {
            if mask[index] > 0 {
                out = VOID_COLOR;
            }
        }
        out
    }
}

/// Quantised value, colour and overlay strength for one smoothed cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredCell {
    pub value: f64,
    pub color: u16,
    pub strength: f64,
}

/// Dithers, quantises and colours one smoothed cell value.
pub fn colorize(kind: MapKind, smoothed: f64, grain: f64, distance_km: f64) -> ColoredCell {
    match kind {
        MapKind::Muf => {
            let v = (smoothed + grain * 5.0).clamp(0.0, MUF_CLIP_MHZ);
            ColoredCell {
                value: v,
                color: lookup(&MUF_LUT, (v * 10.0) as i64),
                strength: (v / MUF_FULL_STRENGTH_MHZ).clamp(0.0, 1.0),
            }
        }
        MapKind::Reliability | MapKind::TakeoffAngle => {
            let v = (smoothed + grain).clamp(0.0, 1.0);
            let percent = (v * 10.0).round() * 10.0;
            let color = if kind == MapKind::Reliability {
                lookup(&RELIABILITY_LUT, (percent * 10.0) as i64)
            } else if percent > TOA_MIN_RELIABILITY {
                lookup(&TOA_LUT, ((2.0 + distance_km / 1000.0 * 8.0) * 10.0) as i64)
            } else {
                lookup(&TOA_LUT, TOA_LUT.len() as i64 - 1)
            };
            ColoredCell {
                value: percent,
                color,
                strength: v,
            }
        }
    }
}
