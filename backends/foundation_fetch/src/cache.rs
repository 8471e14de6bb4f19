//! In-memory response cache.
//!
//! WHY: Re-fetching an unchanged resource is wasted network work; a fresh cached
//! body can be returned without opening a connection at all.
//!
//! WHAT: A URL-keyed store of successful (200) response bodies. Eligibility and
//! lifetime come from the `Cache-Control` header; only `no-store` and
//! `max-age=N` are understood and anything else disables caching for that
//! response. Expired entries are evicted lazily on lookup.
//!
//! HOW: One `Mutex` around a `HashMap`, plus an injectable [`Clock`] so expiry can
//! be tested without sleeping.

use crate::codec::ResponseHeaders;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to; for tests.
#[derive(Debug)]
pub struct ManualClock(Mutex<Instant>);

impl Default for ManualClock {
    fn default() -> Self {
        Self(Mutex::new(Instant::now()))
    }
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How long a cached entry stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No expiry; kept until cleared or replaced. `max-age=0` also maps here.
    Unbounded,
    /// Expires once strictly more than this much time has elapsed.
    MaxAge(Duration),
}

impl Freshness {
    fn from_seconds(seconds: u64) -> Self {
        if seconds == 0 {
            Self::Unbounded
        } else {
            Self::MaxAge(Duration::from_secs(seconds))
        }
    }
}

/// Outcome of evaluating a response's `Cache-Control` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePolicy {
    Store(Freshness),
    /// `no-store` was present.
    NoStore,
    /// A directive other than `no-store` / `max-age=N`; carries the token.
    Unrecognized(String),
}

impl CachePolicy {
    /// Evaluates a `Cache-Control` value (`None` when the header is absent).
    ///
    /// Directives are scanned left to right. `no-store` marks the response
    /// uncacheable, `max-age=N` sets the lifetime (later values override earlier
    /// ones), and any other non-empty token stops the scan as uncacheable.
    /// A `max-age` whose value is not a non-negative integer counts as
    /// unrecognized.
    #[must_use]
    pub fn from_cache_control(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Store(Freshness::Unbounded);
        };

        let mut no_store = false;
        let mut max_age = 0;

        for directive in value.split(',').map(str::trim) {
            if directive.is_empty() {
                continue;
            }

            if directive.eq_ignore_ascii_case("no-store") {
                no_store = true;
                continue;
            }

            let parsed_max_age = directive
                .split_once('=')
                .filter(|(name, _)| name.trim().eq_ignore_ascii_case("max-age"))
                .and_then(|(_, seconds)| seconds.trim().parse::<u64>().ok());

            match parsed_max_age {
                Some(seconds) => max_age = seconds,
                None => return Self::Unrecognized(directive.to_string()),
            }
        }

        if no_store {
            Self::NoStore
        } else {
            Self::Store(Freshness::from_seconds(max_age))
        }
    }
}

/// A cached response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: String,
    pub headers: ResponseHeaders,
    pub stored_at: Instant,
    pub freshness: Freshness,
}

impl CacheEntry {
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.freshness {
            Freshness::Unbounded => false,
            Freshness::MaxAge(max_age) => now.saturating_duration_since(self.stored_at) > max_age,
        }
    }
}

/// URL-keyed response cache.
pub struct ResponseCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // The map is only mutated by whole-entry insert/remove, so a poisoned
        // guard still holds a consistent map.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the fresh entry for `key`, evicting it if it has expired.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut entries = self.entries();

        let entry = entries.get(key)?;
        if entry.is_expired(now) {
            tracing::debug!(
                "Cache entry expired ({:?} since store): {key}",
                now.saturating_duration_since(entry.stored_at)
            );
            entries.remove(key);
            return None;
        }

        tracing::debug!("Cache hit: {key}");
        Some(entry.clone())
    }

    /// Stores a response if it is cacheable; returns whether it was stored.
    ///
    /// Only status 200 is ever stored, and only when [`CachePolicy`] allows it.
    /// A stored entry replaces any previous entry for the same key.
    pub fn store(&self, key: &str, status: u16, body: &str, headers: &ResponseHeaders) -> bool {
        if status != 200 {
            return false;
        }

        let freshness = match CachePolicy::from_cache_control(headers.get("cache-control")) {
            CachePolicy::Store(freshness) => freshness,
            CachePolicy::NoStore => {
                tracing::debug!("Not caching (Cache-Control: no-store): {key}");
                return false;
            }
            CachePolicy::Unrecognized(directive) => {
                if directive.to_ascii_lowercase().starts_with("max-age") {
                    tracing::warn!("Not caching, malformed max-age {directive:?}: {key}");
                } else {
                    tracing::debug!("Not caching (unsupported directive {directive:?}): {key}");
                }
                return false;
            }
        };

        let entry = CacheEntry {
            body: body.to_string(),
            headers: headers.clone(),
            stored_at: self.clock.now(),
            freshness,
        };
        self.entries().insert(key.to_string(), entry);

        match freshness {
            Freshness::MaxAge(max_age) => {
                tracing::debug!("Cached response (max-age={}s): {key}", max_age.as_secs());
            }
            Freshness::Unbounded => tracing::debug!("Cached response (unbounded): {key}"),
        }
        true
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries().clear();
        tracing::debug!("Cache cleared");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
