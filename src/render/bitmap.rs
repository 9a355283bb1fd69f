/// RGB565 bitmap helpers: BMP header, alpha blending, resampling, zlib
/// packing and the on-disk background layers.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::logging::{self, DataSource};
use crate::model::ServiceError;

/// Native render grid.
pub const MAP_WIDTH: usize = 660;
pub const MAP_HEIGHT: usize = 330;

/// BITMAPFILEHEADER (14) + BITMAPV4HEADER (108).
pub const BMP_HEADER_LEN: usize = 122;

const DIB_HEADER_LEN: u32 = 108;
const PIXELS_PER_METRE: i32 = 3780;
const BI_BITFIELDS: u32 = 3;
const LCS_CALIBRATED_RGB: u32 = 1;

pub const COUNTRIES_FILE: &str = "map-D-660x330-Countries.bmp";
pub const TERRAIN_FILE: &str = "map-D-660x330-Terrain.bmp";
pub const MASK_FILE: &str = "countries_mask.bin";

// ---------------------------------------------------------------------------
// BMP header
// ---------------------------------------------------------------------------

/// 122-byte header for a top-down 16 bpp RGB565 image.
pub fn bmp565_header(width: u32, height: u32) -> Vec<u8> {
    let pixel_bytes = width * 2 * height;
    let file_bytes = BMP_HEADER_LEN as u32 + pixel_bytes;

    let mut h = Vec::with_capacity(BMP_HEADER_LEN);
    h.extend_from_slice(b"BM");
    h.extend_from_slice(&file_bytes.to_le_bytes());
    h.extend_from_slice(&0u16.to_le_bytes());
    h.extend_from_slice(&0u16.to_le_bytes());
    h.extend_from_slice(&(BMP_HEADER_LEN as u32).to_le_bytes());

    h.extend_from_slice(&DIB_HEADER_LEN.to_le_bytes());
    h.extend_from_slice(&(width as i32).to_le_bytes());
    // negative height: rows are stored top-down
    h.extend_from_slice(&(-(height as i32)).to_le_bytes());
    h.extend_from_slice(&1u16.to_le_bytes());
    h.extend_from_slice(&16u16.to_le_bytes());
    h.extend_from_slice(&BI_BITFIELDS.to_le_bytes());
    h.extend_from_slice(&pixel_bytes.to_le_bytes());
    h.extend_from_slice(&PIXELS_PER_METRE.to_le_bytes());
    h.extend_from_slice(&PIXELS_PER_METRE.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes());
    for mask in [0xF800u32, 0x07E0, 0x001F, 0x0000] {
        h.extend_from_slice(&mask.to_le_bytes());
    }
    h.extend_from_slice(&LCS_CALIBRATED_RGB.to_le_bytes());
    // CIEXYZTRIPLE endpoints (36 bytes) and three gamma values
    h.resize(BMP_HEADER_LEN, 0);
    h
}

// ---------------------------------------------------------------------------
// Pixel operations
// ---------------------------------------------------------------------------

/// Blends `fg` over `bg` per RGB565 channel with weight `alpha` on `fg`.
/// Channels are truncated toward zero.
pub fn blend_rgb565(fg: u16, bg: u16, alpha: f64) -> u16 {
    let split = |c: u16| ((c >> 11) & 0x1F, (c >> 5) & 0x3F, c & 0x1F);
    let (r1, g1, b1) = split(fg);
    let (r2, g2, b2) = split(bg);
    let inv = 1.0 - alpha;
    let mix = |a: u16, b: u16, max: u16| {
        let v = (a as f64 * alpha + b as f64 * inv).max(0.0) as u16;
        v.min(max)
    };
    (mix(r1, r2, 31) << 11) | (mix(g1, g2, 63) << 5) | mix(b1, b2, 31)
}

/// Nearest-neighbour resample of a row-major grid.
pub fn resample_nearest(
    src: &[u16],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u16> {
    if src_w == dst_w && src_h == dst_h {
        return src.to_vec();
    }
    let mut out = Vec::with_capacity(dst_w * dst_h);
    for y in 0..dst_h {
        let row = y * src_h / dst_h;
        for x in 0..dst_w {
            let col = x * src_w / dst_w;
            out.push(src[row * src_w + col]);
        }
    }
    out
}

/// Little-endian pixel bytes.
pub fn pixels_to_le_bytes(pixels: &[u16]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
}

/// Header + pixels, zlib-compressed.
pub fn encode_bmp565_zlib(width: u32, height: u32, pixels: &[u16]) -> Result<Vec<u8>, ServiceError> {
    let mut raw = bmp565_header(width, height);
    raw.extend_from_slice(&pixels_to_le_bytes(pixels));

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .map_err(|e| ServiceError::Render(format!("zlib write failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| ServiceError::Render(format!("zlib finish failed: {}", e)))
}

// ---------------------------------------------------------------------------
// Background layers
// ---------------------------------------------------------------------------

/// Optional background and mask layers at native resolution.
#[derive(Debug, Clone, Default)]
pub struct BaseMaps {
    pub countries: Option<Vec<u16>>,
    pub terrain: Option<Vec<u16>>,
    pub mask: Option<Vec<u16>>,
}

impl BaseMaps {
    /// Loads whatever layers exist in `dir`. A missing or short file leaves
    /// that layer empty and is logged; it never fails the render.
    pub fn load(dir: &Path) -> Self {
        let countries = read_layer(&dir.join(COUNTRIES_FILE), BMP_HEADER_LEN);
        let terrain = read_layer(&dir.join(TERRAIN_FILE), BMP_HEADER_LEN);
        let mask = read_layer(&dir.join(MASK_FILE), 0);
        if mask.is_none() {
            logging::warn(
                DataSource::Render,
                None,
                &format!("countries mask not found in {}", dir.display()),
            );
        }
        Self {
            countries,
            terrain,
            mask,
        }
    }

    /// Countries layer if present, else terrain.
    pub fn background(&self) -> Option<&[u16]> {
        self.countries.as_deref().or(self.terrain.as_deref())
    }
}

fn read_layer(path: &Path, offset: usize) -> Option<Vec<u16>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(_) => return None,
    };
    match decode_layer(&bytes, offset) {
        Ok(layer) => Some(layer),
        Err(msg) => {
            logging::error(
                DataSource::Render,
                None,
                &format!("{}: {}", path.display(), msg),
            );
            None
        }
    }
}

/// Reads a native-size u16 LE layer starting at `offset`.
pub fn decode_layer(bytes: &[u8], offset: usize) -> Result<Vec<u16>, String> {
    let needed = MAP_WIDTH * MAP_HEIGHT * 2;
    let data = bytes
        .get(offset..offset + needed)
        .ok_or_else(|| format!("expected {} bytes at offset {}, file has {}", needed, offset, bytes.len()))?;
    Ok(data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect())
}
