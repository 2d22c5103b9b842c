//! Input side of a batch: where series come from and how they are cached.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::engine::EngineInput;
use crate::RiskEngineResult;

/// Supplies everything the engine needs for one as-of date.
pub trait ReturnSeriesSource {
    fn load(&mut self, as_of: NaiveDate) -> RiskEngineResult<EngineInput>;
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    loaded_at: DateTime<Utc>,
    value: T,
}

/// Single-value cache with an explicit time-to-live.
///
/// The caller passes the current time on every access, so expiry is fully
/// determined by its arguments.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    ttl: Duration,
    entry: Option<CacheEntry<T>>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| now.signed_duration_since(e.loaded_at) < self.ttl)
    }

    /// The cached value if it has not expired.
    pub fn get(&self, now: DateTime<Utc>) -> Option<&T> {
        if self.is_fresh(now) {
            self.entry.as_ref().map(|e| &e.value)
        } else {
            None
        }
    }

    /// Return the cached value, calling `refresh` first when it is missing
    /// or expired. A failed refresh keeps the previous entry.
    pub fn get_or_refresh<E, F>(&mut self, now: DateTime<Utc>, refresh: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let fresh = self.is_fresh(now);
        let entry = match self.entry.take() {
            Some(entry) if fresh => entry,
            previous => match refresh() {
                Ok(value) => CacheEntry { loaded_at: now, value },
                Err(e) => {
                    self.entry = previous;
                    return Err(e);
                }
            },
        };
        Ok(&self.entry.insert(entry).value)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
