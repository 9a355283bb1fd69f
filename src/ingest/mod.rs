/// External data collaborators.
///
/// Submodules:
/// - `kc2g`: ionosonde station feed client and ingestion filter.
/// - `space_weather`: reader for the scraped space-weather flat files.

pub mod kc2g;
pub mod space_weather;
