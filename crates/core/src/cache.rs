//! Capacity- and time-bounded result caching.
//!
//! Three independent domains share one generic store: raw query results,
//! assembled conversational responses, and language-model completions. Each
//! is a strict LRU behind a mutex with per-entry expiry; an expired entry is
//! a miss and is removed lazily on access.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use keel_common::config::{CacheDomainSettings, CacheSettings};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::models::ExecutionResult;

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

#[derive(Default)]
struct Counters {
    requests: u64,
    hits: u64,
}

/// Point-in-time statistics for one cache domain.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// A strict-LRU cache with per-entry TTL.
///
/// `put` on a full cache evicts exactly the least-recently-accessed entry;
/// `put` on an existing key overwrites it (last write wins).
pub struct TtlLruCache<T: Clone> {
    name: &'static str,
    inner: Mutex<(LruCache<String, Entry<T>>, Counters)>,
    ttl: Duration,
}

impl<T: Clone> TtlLruCache<T> {
    pub fn new(name: &'static str, settings: CacheDomainSettings) -> Self {
        let capacity =
            NonZeroUsize::new(settings.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            inner: Mutex::new((LruCache::new(capacity), Counters::default())),
            ttl: Duration::from_secs(settings.ttl_seconds),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let mut guard = self.inner.lock();
        let (cache, counters) = &mut *guard;
        counters.requests += 1;

        match cache.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                counters.hits += 1;
                debug!(target: "cache", domain = self.name, key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                // Expired: remove lazily, count as a miss
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        let mut guard = self.inner.lock();
        guard.0.put(key, entry);
    }

    /// Remove every expired entry in one pass.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let expired: Vec<String> = guard
            .0
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            guard.0.pop(key);
        }
        if !expired.is_empty() {
            debug!(target: "cache", domain = self.name, removed = expired.len(), "swept expired entries");
        }
        expired.len()
    }

    pub fn clear(&self) {
        self.inner.lock().0.clear();
    }

    /// Read statistics without touching entry recency.
    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock();
        let (cache, counters) = &*guard;
        let misses = counters.requests - counters.hits;
        CacheStats {
            entries: cache.len(),
            requests: counters.requests,
            hits: counters.hits,
            misses,
            hit_rate: if counters.requests == 0 {
                0.0
            } else {
                counters.hits as f64 / counters.requests as f64
            },
        }
    }
}

/// The three cache domains, constructed once and passed by handle to every
/// component that needs them.
pub struct ResponseCaches {
    pub query_results: TtlLruCache<ExecutionResult>,
    pub responses: TtlLruCache<String>,
    pub completions: TtlLruCache<String>,
}

impl ResponseCaches {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            query_results: TtlLruCache::new("query_results", settings.query_results),
            responses: TtlLruCache::new("responses", settings.responses),
            completions: TtlLruCache::new("completions", settings.completions),
        }
    }
}

/// Normalize a free-text question into a cache key: case-folded, trimmed,
/// trailing punctuation dropped. Deliberately relaxes key equality so
/// trivially different phrasings of the same question share an entry.
pub fn normalize_question(question: &str) -> String {
    question
        .trim()
        .to_lowercase()
        .trim_end_matches(['?', '!', '.', ',', ';', ':'])
        .trim_end()
        .to_string()
}
