/// Observation freshness and clock injection.
///
/// Ionosonde stations publish a new sounding every 5–15 minutes, but the
/// KC2G feed keeps a station listed long after it has stopped reporting. A
/// measurement older than the freshness window says nothing useful about
/// the ionosphere right now, so ingestion drops it.
///
/// # Clock injection
/// Every time-dependent component takes a `Clock` rather than calling
/// `Utc::now()` internally. Production code uses `SystemClock`; tests use
/// `ManualClock` and move it forward to simulate cache expiry without
/// sleeping.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Source of "now" for caches and ingestion filters.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = instant;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

// ---------------------------------------------------------------------------
// Freshness checks
// ---------------------------------------------------------------------------

/// Returns `true` if `observed` lies within `window` of `now`, in either
/// direction.
///
/// Stations occasionally report timestamps slightly in the future (clock
/// drift at the ionosonde, or a simulated "now" on the client), so the check
/// is on the absolute difference:
///   |now - observed| <= window  →  fresh
///   |now - observed| >  window  →  stale
pub fn is_fresh_at(observed: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(observed);
    age.abs() <= window
}

/// Returns `true` once `window` has fully elapsed since `stamp`.
///
/// Used for cache TTLs, where only forward time matters. A `stamp` that is
/// ahead of `now` counts as fresh.
pub fn has_expired(stamp: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(stamp) >= window
}

/// Parses a feed timestamp into UTC.
///
/// Accepts RFC 3339 (`2024-05-01T12:00:00Z`, `...+02:00`) and naive ISO
/// 8601 without an offset, which the feed uses for some stations and which
/// is taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty timestamp".to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    Err(format!("unrecognised timestamp '{}'", trimmed))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
