/// Space-weather flat-file reader
///
/// External scraper jobs refresh a set of small text files (sunspot number,
/// Kp, solar wind, Bz, solar flux). This module reads the latest value from
/// each and assembles a `SpaceWeatherSnapshot`. It never fails: each field
/// falls back to its fixed default independently when its file is missing
/// or unreadable.
///
/// File layout under the base directory:
///   ssn/ssn-31.txt                 "YYYY MM DD SSN" rows, last row wins
///   geomag/kindex.txt              one Kp per line; line 56 is "now"
///   solar-wind/swind-24hr.txt      "UNIX density speed" rows, last row wins
///   Bz/Bz.txt                      "UNIX Bx By Bz Bt" rows, '#' header
///   solar-flux/solarflux-99.txt    one flux value per line, last wins

use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::log_space_weather_failure;
use crate::model::SpaceWeatherSnapshot;

/// Line index in `kindex.txt` holding the current Kp. The file carries 56
/// observed 3-hour bins followed by 16 forecast bins.
const KINDEX_NOW_LINE: usize = 55;

/// Supplies the space-weather conditions for a request.
pub trait SpaceWeatherSource: Send + Sync {
    fn snapshot(&self) -> SpaceWeatherSnapshot;
}

/// A source that always returns the same snapshot. Used for tests and for
/// deployments without the scraper jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSpaceWeather(pub SpaceWeatherSnapshot);

impl SpaceWeatherSource for FixedSpaceWeather {
    fn snapshot(&self) -> SpaceWeatherSnapshot {
        self.0
    }
}

/// Reads the scraper output files from a base directory on every call.
#[derive(Debug, Clone)]
pub struct FlatFileSpaceWeather {
    base_dir: PathBuf,
}

impl FlatFileSpaceWeather {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn read_field(&self, relative: &str, parse: fn(&str) -> Result<f64, String>, default: f64) -> f64 {
        let path = self.base_dir.join(relative);
        match read_file(&path).and_then(|text| parse(&text)) {
            Ok(value) if value.is_finite() => value,
            Ok(value) => {
                log_space_weather_failure(relative, &format!("invalid value {}", value));
                default
            }
            Err(msg) => {
                log_space_weather_failure(relative, &msg);
                default
            }
        }
    }
}

impl SpaceWeatherSource for FlatFileSpaceWeather {
    fn snapshot(&self) -> SpaceWeatherSnapshot {
        let defaults = SpaceWeatherSnapshot::default();
        SpaceWeatherSnapshot {
            ssn: self.read_field("ssn/ssn-31.txt", parse_ssn, defaults.ssn),
            kp: self.read_field("geomag/kindex.txt", parse_kindex, defaults.kp),
            bz: self.read_field("Bz/Bz.txt", parse_bz, defaults.bz),
            sw_speed: self.read_field("solar-wind/swind-24hr.txt", parse_solar_wind, defaults.sw_speed),
            sfi: self.read_field("solar-flux/solarflux-99.txt", parse_solar_flux, defaults.sfi),
        }
    }
}

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))
}

// ---------------------------------------------------------------------------
// Per-file parsers
// ---------------------------------------------------------------------------

fn data_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect()
}

fn column(line: &str, index: usize) -> Result<f64, String> {
    let field = line
        .split_whitespace()
        .nth(index)
        .ok_or_else(|| format!("malformed line, no column {}: '{}'", index + 1, line))?;
    field
        .parse::<f64>()
        .map_err(|_| format!("malformed number '{}' in line '{}'", field, line))
}

fn last_line(text: &str) -> Result<&str, String> {
    data_lines(text)
        .last()
        .copied()
        .ok_or_else(|| "file has no data lines (not found)".to_string())
}

/// Sunspot number: fourth column of the last row.
pub fn parse_ssn(text: &str) -> Result<f64, String> {
    column(last_line(text)?, 3)
}

/// Kp: line 56 when the file is longer than that, else the last line.
pub fn parse_kindex(text: &str) -> Result<f64, String> {
    let lines = data_lines(text);
    let line = if lines.len() > KINDEX_NOW_LINE {
        lines[KINDEX_NOW_LINE]
    } else {
        lines
            .last()
            .copied()
            .ok_or_else(|| "file has no data lines (not found)".to_string())?
    };
    column(line, 0)
}

/// Solar wind speed: third column of the last row.
pub fn parse_solar_wind(text: &str) -> Result<f64, String> {
    column(last_line(text)?, 2)
}

/// Bz: fourth column of the last non-comment row.
pub fn parse_bz(text: &str) -> Result<f64, String> {
    column(last_line(text)?, 3)
}

/// Solar flux: the last value in the file.
pub fn parse_solar_flux(text: &str) -> Result<f64, String> {
    column(last_line(text)?, 0)
}
