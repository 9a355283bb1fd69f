/// False-colour lookup tables for the map renderer.
///
/// Each table maps a quantised value index to an RGB565 colour by
/// piecewise-linear interpolation over a short list of control points.
/// Tables are built on first use and never change afterwards.

use once_cell::sync::Lazy;

/// (value, 0xRRGGBB) control point.
pub type ControlPoint = (f64, u32);

/// MUF scale, MHz.
pub const MUF_SCALE: &[ControlPoint] = &[
    (0.0, 0x000000),
    (4.0, 0x4E138A),
    (9.0, 0x001EF5),
    (15.0, 0x78FBD6),
    (20.0, 0x78FA4D),
    (27.0, 0xFEFD54),
    (30.0, 0xEC6F2D),
    (35.0, 0xE93323),
];

/// Reliability scale, percent.
pub const RELIABILITY_SCALE: &[ControlPoint] = &[
    (0.0, 0x666666),
    (21.0, 0xEE6766),
    (40.0, 0xEEEE44),
    (60.0, 0xEEEE44),
    (83.0, 0x44CC44),
    (100.0, 0x44CC44),
];

/// Takeoff-angle scale, degrees-ish.
pub const TOA_SCALE: &[ControlPoint] = &[
    (0.0, 0x44CC44),
    (5.0, 0x44CC44),
    (15.0, 0xEEEE44),
    (25.0, 0xEE6766),
    (40.0, 0x666666),
];

pub const MUF_LUT_LEN: usize = 501;
pub const RELIABILITY_LUT_LEN: usize = 1001;
pub const TOA_LUT_LEN: usize = 401;

/// Colour written where there is nothing to show.
pub const VOID_COLOR: u16 = 0x0000;

pub static MUF_LUT: Lazy<Vec<u16>> = Lazy::new(|| build_lut(MUF_SCALE, MUF_LUT_LEN));
pub static RELIABILITY_LUT: Lazy<Vec<u16>> =
    Lazy::new(|| build_lut(RELIABILITY_SCALE, RELIABILITY_LUT_LEN));
pub static TOA_LUT: Lazy<Vec<u16>> = Lazy::new(|| build_lut(TOA_SCALE, TOA_LUT_LEN));

/// Packs 8-bit channels into RGB565.
pub fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

fn channels(rgb: u32) -> (u8, u8, u8) {
    (((rgb >> 16) & 0xFF) as u8, ((rgb >> 8) & 0xFF) as u8, (rgb & 0xFF) as u8)
}

/// RGB565 colour for `value` on `scale`. Values outside the scale take the
/// end colours; channels are truncated toward zero when interpolating.
pub fn interpolate_color(value: f64, scale: &[ControlPoint]) -> u16 {
    let (Some(first), Some(last)) = (scale.first(), scale.last()) else {
        return VOID_COLOR;
    };
    if value <= first.0 {
        let (r, g, b) = channels(first.1);
        return pack_rgb565(r, g, b);
    }
    if value >= last.0 {
        let (r, g, b) = channels(last.1);
        return pack_rgb565(r, g, b);
    }

    for pair in scale.windows(2) {
        let ((v1, c1), (v2, c2)) = (pair[0], pair[1]);
        if v1 <= value && value <= v2 {
            let f = (value - v1) / (v2 - v1);
            let (r1, g1, b1) = channels(c1);
            let (r2, g2, b2) = channels(c2);
            let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f) as u8;
            return pack_rgb565(lerp(r1, r2), lerp(g1, g2), lerp(b1, b2));
        }
    }
    let (r, g, b) = channels(last.1);
    pack_rgb565(r, g, b)
}

/// Table of `len` colours at 0.1 steps from 0.
pub fn build_lut(scale: &[ControlPoint], len: usize) -> Vec<u16> {
    (0..len)
        .map(|i| interpolate_color(i as f64 / 10.0, scale))
        .collect()
}

/// Looks up `index` in `lut`, clamping to the table.
pub fn lookup(lut: &[u16], index: i64) -> u16 {
    if lut.is_empty() {
        return VOID_COLOR;
    }
    let i = index.clamp(0, lut.len() as i64 - 1) as usize;
    lut[i]
}
