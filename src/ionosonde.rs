//! Ionosonde station cache and spatial interpolation.
//!
//! The store keeps one immutable snapshot of validated stations. A fetch
//! replaces the snapshot wholesale; a failed fetch keeps the old one and
//! still restarts the TTL so a dead feed is not hammered on every request.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

use crate::freshness::{Clock, has_expired};
use crate::geo::haversine_km;
use crate::ingest::kc2g::{self, Kc2gRecord};
use crate::logging::{self, DataSource};
use crate::model::{
    GeoPoint, IngestError, InterpolationMethod, InterpolationResult, NearestStation, Station,
};

/// Anything that can produce raw feed records. The network client in
/// production, a canned list in tests.
pub trait StationSource: Send + Sync {
    fn fetch_records(&self) -> Result<Vec<Kc2gRecord>, IngestError>;
}

/// `StationSource` backed by the KC2G HTTP feed.
pub struct HttpStationSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpStationSource {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, IngestError> {
        Ok(Self {
            client: kc2g::build_client(timeout_secs)?,
            url: url.to_string(),
        })
    }
}

impl StationSource for HttpStationSource {
    fn fetch_records(&self) -> Result<Vec<Kc2gRecord>, IngestError> {
        kc2g::fetch_records(&self.client, &self.url)
    }
}

/// Tunables for the store. Defaults follow the KC2G feed cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    /// How long a snapshot is served before the next fetch.
    pub ttl: Duration,
    /// Observations further than this from "now" are dropped at ingestion.
    pub freshness_window: Duration,
    /// Beyond this distance from every station there is no coverage.
    pub max_coverage_km: f64,
    /// Within this distance the nearest station is used directly.
    pub direct_radius_km: f64,
    /// Upper bound on stations blended by IDW.
    pub max_neighbors: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(10),
            freshness_window: Duration::hours(24),
            max_coverage_km: 3000.0,
            direct_radius_km: 50.0,
            max_neighbors: 5,
        }
    }
}

struct CacheState {
    stations: Arc<Vec<Station>>,
    fetched_at: Option<DateTime<Utc>>,
}

pub struct IonosondeStore {
    source: Box<dyn StationSource>,
    clock: Arc<dyn Clock>,
    settings: StoreSettings,
    state: Mutex<CacheState>,
}

impl IonosondeStore {
    pub fn new(
        source: Box<dyn StationSource>,
        clock: Arc<dyn Clock>,
        settings: StoreSettings,
    ) -> Self {
        Self {
            source,
            clock,
            settings,
            state: Mutex::new(CacheState {
                stations: Arc::new(Vec::new()),
                fetched_at: None,
            }),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Pulls the feed, validates it and replaces the snapshot.
    ///
    /// Never fails: on any fetch or parse error the previous snapshot is
    /// returned unchanged, and the cache timestamp is bumped anyway.
    pub fn fetch(&self) -> Arc<Vec<Station>> {
        let now = self.clock.now();
        logging::info(DataSource::Ionosonde, None, "Fetching ionosonde stations");

        let outcome = self.source.fetch_records().map(|records| {
            let total = records.len();
            let (kept, dropped) =
                kc2g::ingest_records(&records, now, self.settings.freshness_window);
            logging::log_ingest_summary(total, kept.len(), dropped);
            kept
        });

        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.fetched_at = Some(now);
        match outcome {
            Ok(stations) => {
                state.stations = Arc::new(stations);
            }
            Err(err) => {
                logging::log_feed_failure("station fetch", &err);
            }
        }
        Arc::clone(&state.stations)
    }

    /// Current snapshot, fetching first if the TTL has run out.
    pub fn stations(&self) -> Arc<Vec<Station>> {
        let now = self.clock.now();
        {
            let state = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(stamp) = state.fetched_at {
                if !has_expired(stamp, self.settings.ttl, now) {
                    return Arc::clone(&state.stations);
                }
            }
        }
        self.fetch()
    }

    /// Estimates ionospheric parameters at a point from the current snapshot.
    pub fn interpolate(&self, lat: f64, lon: f64) -> InterpolationResult {
        let stations = self.stations();
        interpolate_at(&stations, GeoPoint::new(lat, lon), &self.settings)
    }
}

/// IDW estimate at `point` over an explicit station set.
///
/// Each optional field is averaged only over the neighbours that report it:
/// a station missing mufd contributes nothing to either the mufd numerator
/// or its weight sum.
pub fn interpolate_at(
    stations: &[Station],
    point: GeoPoint,
    settings: &StoreSettings,
) -> InterpolationResult {
    let mut ranked: Vec<(&Station, f64)> = stations
        .iter()
        .map(|s| (s, haversine_km(point, GeoPoint::new(s.lat, s.lon))))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let Some(&(closest, closest_km)) = ranked.first() else {
        return InterpolationResult::no_coverage(None);
    };
    let nearest = NearestStation {
        code: closest.code.clone(),
        name: closest.name.clone(),
        distance_km: closest_km,
    };

    if closest_km > settings.max_coverage_km {
        return InterpolationResult::no_coverage(Some(nearest));
    }

    if closest_km < settings.direct_radius_km {
        return InterpolationResult {
            method: InterpolationMethod::Direct,
            fof2: Some(closest.fof2),
            mufd: closest.mufd,
            hmf2: closest.hmf2,
            md: Some(closest.md),
            nearest: Some(nearest),
            stations_used: 1,
        };
    }

    let neighbors: Vec<(&Station, f64)> = ranked
        .into_iter()
        .filter(|(_, d)| *d <= settings.max_coverage_km)
        .take(settings.max_neighbors)
        .collect();

    let weighted = |field: fn(&Station) -> Option<f64>| -> Option<f64> {
        let mut value_sum = 0.0;
        let mut weight_sum = 0.0;
        for (station, distance) in &neighbors {
            if let Some(value) = field(station) {
                let w = idw_weight(station.confidence, *distance);
                value_sum += value * w;
                weight_sum += w;
            }
        }
        if weight_sum > 0.0 {
            Some(value_sum / weight_sum)
        } else {
            None
        }
    };

    let fof2 = weighted(|s| Some(s.fof2));
    if fof2.is_none() {
        return InterpolationResult::no_coverage(Some(nearest));
    }

    InterpolationResult {
        method: InterpolationMethod::Interpolated,
        fof2,
        mufd: weighted(|s| s.mufd),
        hmf2: weighted(|s| s.hmf2),
        md: Some(weighted(|s| Some(s.md)).unwrap_or(kc2g::DEFAULT_MD)),
        nearest: Some(nearest),
        stations_used: neighbors.len(),
    }
}

/// IDW weight: confidence-scaled inverse square distance, with distances
/// under 1 km treated as 1 km.
pub fn idw_weight(confidence: f64, distance_km: f64) -> f64 {
    (confidence / 100.0) / distance_km.max(1.0).powi(2)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
