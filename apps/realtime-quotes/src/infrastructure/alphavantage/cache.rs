//! Response cache with per-kind time-to-live.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::infrastructure::metrics;

/// Cache lifetime per request kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTtl {
    /// `GLOBAL_QUOTE`.
    pub quote: Duration,
    /// `SYMBOL_SEARCH`.
    pub search: Duration,
    /// `TIME_SERIES_INTRADAY`.
    pub intraday: Duration,
    /// `TIME_SERIES_DAILY`.
    pub daily: Duration,
    /// `MARKET_STATUS`, used as the reachability probe.
    pub market_status: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            quote: Duration::from_secs(60),
            search: Duration::from_secs(10 * 60),
            intraday: Duration::from_secs(5 * 60),
            daily: Duration::from_secs(15 * 60),
            market_status: Duration::from_secs(60),
        }
    }
}

/// Entries kept before the oldest is evicted.
pub(super) const DEFAULT_CAPACITY: usize = 256;

struct Entry {
    expires_at: Instant,
    body: serde_json::Value,
}

/// Decoded response bodies keyed by request, bounded to `capacity` entries.
pub(super) struct ResponseCache {
    capacity: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ResponseCache {
    pub(super) fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh entry for `key`, if any. An expired entry is evicted.
    pub(super) fn get(&self, kind: &'static str, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock();
        let hit = match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };
        metrics::record_cache_lookup(kind, hit.is_some());
        hit
    }

    /// Store `body` for `ttl`. A full cache first drops expired entries,
    /// then the one closest to expiry.
    pub(super) fn insert(&self, key: String, body: serde_json::Value, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.retain(|_, entry| now < entry.expires_at);
            if entries.len() >= self.capacity
                && let Some(victim) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }

        entries.insert(
            key,
            Entry {
                expires_at: now + ttl,
                body,
            },
        );
    }

    pub(super) fn clear(&self) {
        self.entries.lock().clear();
    }

    pub(super) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
