/// Native equirectangular grid: cell coordinates, per-cell evaluation,
/// smoothing and dither.

use crate::propagation::skywave::{CellEstimate, SkywaveModel};
use crate::render::bitmap::{MAP_HEIGHT, MAP_WIDTH};

/// Latitude of row `y`, degrees. Row 0 is the north pole.
pub fn row_lat_deg(y: usize, height: usize) -> f64 {
    90.0 - y as f64 * 180.0 / height as f64
}

/// Longitude of column `x`, degrees. Column 0 is the antimeridian.
pub fn col_lon_deg(x: usize, width: usize) -> f64 {
    -180.0 + x as f64 * 360.0 / width as f64
}

/// Evaluates every native cell, row-major from the top-left.
pub fn evaluate_grid(model: &SkywaveModel) -> Vec<CellEstimate> {
    let lons: Vec<f64> = (0..MAP_WIDTH)
        .map(|x| col_lon_deg(x, MAP_WIDTH).to_radians())
        .collect();
    let mut cells = Vec::with_capacity(MAP_WIDTH * MAP_HEIGHT);
    for y in 0..MAP_HEIGHT {
        let lat = row_lat_deg(y, MAP_HEIGHT).to_radians();
        cells.extend(lons.iter().map(|&lon| model.evaluate(lat, lon)));
    }
    cells
}

/// Cross-shaped 3×3 smoothing: centre weight 4, four neighbours weight 1.
/// Columns wrap around the globe; rows clamp at the poles.
pub fn smooth_cross(values: &[f64], width: usize, height: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for y in 0..height {
        let up = y.saturating_sub(1);
        let down = (y + 1).min(height - 1);
        for x in 0..width {
            let left = (x + width - 1) % width;
            let right = (x + 1) % width;
            let at = |r: usize, c: usize| values[r * width + c];
            let sum = at(y, x) * 4.0 + at(y, left) + at(y, right) + at(up, x) + at(down, x);
            out.push(sum / 8.0);
        }
    }
    out
}

/// Ordered dither in [-0.035, 0.035], fixed per cell.
pub fn dither(x: usize, y: usize) -> f64 {
    (((x * 13) ^ (y * 17)) & 7) as f64 / 100.0 - 0.035
}
