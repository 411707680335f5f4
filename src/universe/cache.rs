//! Process-wide universe cache with TTL.
//!
//! The exchange listing pages change at most daily, so the fetched universe
//! is held for 24 hours and invalidated by the timer only.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use super::Universe;

/// Default TTL: 24 hours.
const DEFAULT_TTL_SECS: i64 = 86_400;

#[derive(Debug, Clone)]
struct CacheEntry {
    universe: Universe,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(universe: Universe, ttl_secs: i64) -> Self {
        Self {
            universe,
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Universe cache.
pub struct UniverseCache {
    entry: RwLock<Option<CacheEntry>>,
    ttl_secs: i64,
}

impl Default for UniverseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl UniverseCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL_SECS)
    }

    pub fn with_ttl(ttl_secs: i64) -> Self {
        Self {
            entry: RwLock::new(None),
            ttl_secs,
        }
    }

    /// Get the cached universe if present and not expired.
    pub fn get(&self) -> Option<Universe> {
        let guard = self.entry.read().ok()?;
        guard.as_ref().and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.universe.clone())
            }
        })
    }

    /// Cache a freshly fetched universe.
    pub fn set(&self, universe: Universe) {
        if let Ok(mut guard) = self.entry.write() {
            *guard = Some(CacheEntry::new(universe, self.ttl_secs));
        }
    }

    /// Drop the cached universe.
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.entry.write() {
            *guard = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::Symbol;

    fn sample() -> Universe {
        Universe::new(vec![Symbol::new("2330.TW", "台積電")])
    }

    #[test]
    fn test_cache_hit() {
        let cache = UniverseCache::new();
        assert!(cache.get().is_none());

        cache.set(sample());
        assert_eq!(cache.get().unwrap().len(), 1);
    }

    #[test]
    fn test_cache_expiry() {
        let cache = UniverseCache::with_ttl(-1);
        cache.set(sample());
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_cache_invalidate() {
        let cache = UniverseCache::new();
        cache.set(sample());
        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
