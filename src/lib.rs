/// HF radio propagation forecast service.
///
/// Predicts point-to-point skywave reliability between two stations and
/// renders world maps of reliability, MUF and takeoff angle from a single
/// transmitter. Ionospheric input comes from the KC2G ionosonde feed and
/// scraped space-weather files; everything else is computed here.
///
/// Modules:
/// - `model`, `bands`, `geo`: shared types, band registry, sphere math.
/// - `ingest`, `ionosonde`: feed clients, station cache, IDW interpolation.
/// - `propagation`: the single-path model and the per-cell skywave model.
/// - `forecast`, `render`: text forecast and map rendering.
/// - `cache`, `service`: result cache and the request facade.
/// - `config`, `logging`, `freshness`, `query`: ambient plumbing.

pub mod bands;
pub mod cache;
pub mod config;
pub mod forecast;
pub mod freshness;
pub mod geo;
pub mod ingest;
pub mod ionosonde;
pub mod logging;
pub mod model;
pub mod propagation;
pub mod query;
pub mod render;
pub mod service;
