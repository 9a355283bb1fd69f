//! HF propagation model.
//!
//! `path` holds the single-path MUF/LUF/reliability model used for text
//! forecasts; `skywave` holds the per-cell estimate the map renderer
//! evaluates across the whole grid.

pub mod path;
pub mod skywave;
