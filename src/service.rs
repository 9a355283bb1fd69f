/// Request-level facade.
///
/// `PropagationService` owns the long-lived pieces (ionosonde store,
/// space-weather source, renderer, result cache, clock) and turns parsed
/// queries into response bytes. It is `Send + Sync`; the only shared
/// mutable state is the station snapshot and the result cache, each behind
/// its own mutex.

use chrono::{Duration, Timelike};
use std::sync::Arc;

use crate::bands::find_band;
use crate::cache::{CacheStats, ResultCache, fingerprint};
use crate::config::ServiceConfig;
use crate::forecast::{self, BandForecast};
use crate::freshness::{Clock, SystemClock};
use crate::ingest::space_weather::{FixedSpaceWeather, FlatFileSpaceWeather, SpaceWeatherSource};
use crate::ionosonde::{HttpStationSource, IonosondeStore, StationSource};
use crate::logging::{self, DataSource};
use crate::model::{
    GeoPoint, PathQuery, PointPrediction, ServiceError, SpaceWeatherSnapshot,
};
use crate::propagation::path::{PathEnvironment, point_propagation};
use crate::query::{DEFAULT_MAP_MHZ, Query};
use crate::render::bitmap::BaseMaps;
use crate::render::{GridRenderer, MapKind, RenderedMap};

pub struct PropagationService {
    store: IonosondeStore,
    weather: Box<dyn SpaceWeatherSource>,
    renderer: GridRenderer,
    cache: ResultCache<RenderedMap>,
    clock: Arc<dyn Clock>,
}

impl PropagationService {
    pub fn new(
        store: IonosondeStore,
        weather: Box<dyn SpaceWeatherSource>,
        renderer: GridRenderer,
        cache: ResultCache<RenderedMap>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            weather,
            renderer,
            cache,
            clock,
        }
    }

    /// Production wiring from configuration: KC2G HTTP feed, flat-file
    /// space weather (or fixed defaults), background layers from the assets
    /// directory, system clock.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let source: Box<dyn StationSource> = Box::new(
            HttpStationSource::new(&config.ionosonde.url, config.ionosonde.timeout_secs)
                .map_err(|e| ServiceError::Io(e.to_string()))?,
        );
        let store = IonosondeStore::new(source, clock.clone(), config.ionosonde.store_settings());

        let weather: Box<dyn SpaceWeatherSource> = match &config.space_weather.base_dir {
            Some(dir) => Box::new(FlatFileSpaceWeather::new(dir)),
            None => Box::new(FixedSpaceWeather::default()),
        };

        let base_maps = match &config.render.assets_dir {
            Some(dir) => BaseMaps::load(dir),
            None => BaseMaps::default(),
        };

        let cache = ResultCache::new(
            clock.clone(),
            Duration::seconds(config.render.cache_ttl_secs),
            config.render.cache_capacity,
        );

        Ok(Self::new(store, weather, GridRenderer::new(base_maps), cache, clock))
    }

    pub fn store(&self) -> &IonosondeStore {
        &self.store
    }

    pub fn space_weather(&self) -> SpaceWeatherSnapshot {
        self.weather.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn current_hour(&self) -> f64 {
        self.clock.now().hour() as f64
    }

    /// Hour-by-band forecast between TX and RX.
    pub fn band_forecast(&self, query: &Query) -> Result<BandForecast, ServiceError> {
        let request = query.forecast_request(self.clock.now())?;
        let swx = self.weather.snapshot();
        Ok(forecast::build_forecast(&self.store, &swx, &request, self.current_hour()))
    }

    /// The band forecast as response text.
    pub fn band_conditions(&self, query: &Query) -> Result<String, ServiceError> {
        Ok(self.band_forecast(query)?.to_text())
    }

    /// DE/DX whole-percent reliability per band, as `label,percent` lines.
    pub fn band_summary(&self, query: &Query) -> Result<String, ServiceError> {
        let request = query.forecast_request(self.clock.now())?;
        let swx = self.weather.snapshot();
        let ssn = request.ssn_override.unwrap_or(swx.ssn);
        let entries = forecast::band_summary(
            &self.store,
            &swx,
            request.tx,
            request.rx,
            ssn,
            self.clock.now(),
        );
        Ok(forecast::format_summary(&entries))
    }

    /// Single-path prediction at one frequency: `BAND` (a registry label
    /// such as `20m`) or `MHZ`, default 14.
    pub fn point(&self, query: &Query) -> Result<PointPrediction, ServiceError> {
        let now = self.clock.now();
        let request = query.forecast_request(now)?;
        let swx = self.weather.snapshot();
        let freq_mhz = match query.get("BAND") {
            Some(label) => find_band(label)
                .map(|band| band.mhz)
                .ok_or_else(|| ServiceError::InvalidParameter {
                    name: "BAND".to_string(),
                    value: label.to_string(),
                })?,
            None => query.f64_or("MHZ", DEFAULT_MAP_MHZ)?,
        };
        let path_query = PathQuery {
            tx: request.tx,
            rx: request.rx,
            freq_mhz,
            mode: request.mode,
            power_watts: request.power_watts,
            toa_deg: request.toa_deg,
            utc_hour: query.f64_or("UTC", now.hour() as f64)?,
            month: request.month,
            year: request.year,
            path: request.path,
        };
        let env = PathEnvironment {
            ssn: request.ssn_override.unwrap_or(swx.ssn),
            sfi: swx.sfi,
            k_index: swx.kp,
            current_hour: self.current_hour(),
        };
        Ok(point_propagation(&self.store, &path_query, &env))
    }

    /// Map of `kind`, served from the cache when an identical request was
    /// rendered within the TTL.
    pub fn map(&self, query: &Query, kind: MapKind) -> Result<Arc<RenderedMap>, ServiceError> {
        let now = self.clock.now();
        let request = query.map_request(kind, now)?;
        let swx = self.weather.snapshot();
        let key = fingerprint(&request.canonical_key(&swx));

        let map = self.cache.get_or_insert_with(&key, || {
            logging::info(
                DataSource::Render,
                Some(&key[..12]),
                &format!(
                    "cache miss, rendering {} map for ({:.2}, {:.2}) at {} MHz",
                    request.effective_kind(),
                    request.tx.lat,
                    request.tx.lon,
                    request.freq_mhz
                ),
            );
            self.renderer.render(&request, &swx, key.clone(), now)
        })?;
        Ok(map)
    }

    /// Convenience for callers holding only coordinates.
    pub fn interpolate(&self, point: GeoPoint) -> crate::model::InterpolationResult {
        self.store.interpolate(point.lat, point.lon)
    }
}
