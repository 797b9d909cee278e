//! TTL keyed caches used by the scanner and the change resolver.
//!
//! Entries are stamped with `tokio::time::Instant` so expiry follows the
//! runtime clock (and a paused clock in tests).

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::config::CacheSettings;
use crate::core::HoldingRecord;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub stored_at: Instant,
    pub ttl: Duration,
    pub payload: V,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Generic memoization keyed by string with a default TTL
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Cached payload, evicting it if the entry has outlived its TTL
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.payload.clone()),
            Some(_) => {}
        }
        // Shard guard from `get` is released before removing
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        debug!("{} cache entry expired: {}", self.name, key);
        None
    }

    pub fn set(&self, key: impl Into<String>, payload: V) {
        self.set_with_ttl(key, payload, self.ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, payload: V, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                stored_at: Instant::now(),
                ttl,
                payload,
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 24h change cache whose TTL shrinks when the stored change is zero.
///
/// A zero usually means the upstream had no data yet, so it is retried
/// sooner instead of being pinned for the full TTL.
pub struct ChangeCache {
    inner: TtlCache<f64>,
    zero_ttl: Duration,
    zero_epsilon: f64,
}

impl ChangeCache {
    pub fn new(ttl: Duration, zero_ttl: Duration, zero_epsilon: f64) -> Self {
        Self {
            inner: TtlCache::new("change", ttl),
            zero_ttl,
            zero_epsilon,
        }
    }

    pub fn get(&self, token: &str) -> Option<f64> {
        self.inner.get(token)
    }

    pub fn set(&self, token: impl Into<String>, pct: f64) {
        if pct.is_finite() && pct.abs() > self.zero_epsilon {
            self.inner.set(token, pct);
        } else {
            self.inner.set_with_ttl(token, 0.0, self.zero_ttl);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// The four independently keyed caches owned by a scanner context
pub struct Caches {
    /// Raw holdings per `chain:wallet`
    pub wallet_scan: TtlCache<Vec<HoldingRecord>>,
    /// 24h change percent per token
    pub change: ChangeCache,
    /// Token overview payload per token
    pub overview: TtlCache<Value>,
    /// Market cap in USD per token
    pub market_cap: TtlCache<f64>,
}

impl Caches {
    pub fn new(settings: &CacheSettings, zero_epsilon: f64) -> Self {
        Self {
            wallet_scan: TtlCache::new("wallet", Duration::from_secs(settings.wallet_ttl_secs)),
            change: ChangeCache::new(
                Duration::from_secs(settings.change_ttl_secs),
                Duration::from_secs(settings.change_zero_ttl_secs),
                zero_epsilon,
            ),
            overview: TtlCache::new("overview", Duration::from_secs(settings.overview_ttl_secs)),
            market_cap: TtlCache::new(
                "market_cap",
                Duration::from_secs(settings.market_cap_ttl_secs),
            ),
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.wallet_scan.purge_expired()
            + self.change.inner.purge_expired()
            + self.overview.purge_expired()
            + self.market_cap.purge_expired()
    }
}
