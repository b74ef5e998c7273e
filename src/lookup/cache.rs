//! Expiring LRU caches in front of the lookup collaborators.
//!
//! Only successful answers are cached; "no match" is an answer, an error is
//! not.

use anyhow::Result;
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{GeocodeMatch, Geocoder, RouteRecord, RouteSource};

pub struct TtlCache<K: Hash + Eq, V: Clone> {
    entries: Mutex<LruCache<K, (Instant, V)>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<K, (Instant, V)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some((stored, value)) if stored.elapsed() < self.ttl => return Some(value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.lock().put(key, (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Geocoder cache keyed by the lowercased, whitespace-collapsed address.
pub struct CachedGeocoder {
    inner: Arc<dyn Geocoder>,
    cache: TtlCache<String, Option<GeocodeMatch>>,
}

impl CachedGeocoder {
    pub fn new(inner: Arc<dyn Geocoder>, capacity: usize, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(capacity, ttl),
        }
    }
}

fn address_key(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Geocoder for CachedGeocoder {
    fn geocode(&self, address: &str) -> Result<Option<GeocodeMatch>> {
        let key = address_key(address);
        if let Some(hit) = self.cache.get(&key) {
            debug!(key = %key, "Geocode cache hit");
            return Ok(hit);
        }
        let result = self.inner.geocode(address)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }
}

/// Route cache keyed by the point rounded to four decimals and the radius.
pub struct CachedRoutes {
    inner: Arc<dyn RouteSource>,
    cache: TtlCache<(i64, i64, u32), Vec<RouteRecord>>,
}

impl CachedRoutes {
    pub fn new(inner: Arc<dyn RouteSource>, capacity: usize, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(capacity, ttl),
        }
    }
}

fn point_key(x: f64, y: f64, radius_ft: u32) -> (i64, i64, u32) {
    ((x * 1e4).round() as i64, (y * 1e4).round() as i64, radius_ft)
}

impl RouteSource for CachedRoutes {
    fn routes_near(&self, x: f64, y: f64, radius_ft: u32) -> Result<Vec<RouteRecord>> {
        let key = point_key(x, y, radius_ft);
        if let Some(hit) = self.cache.get(&key) {
            debug!(?key, "Routes cache hit");
            return Ok(hit);
        }
        let routes = self.inner.routes_near(x, y, radius_ft)?;
        self.cache.insert(key, routes.clone());
        Ok(routes)
    }
}
