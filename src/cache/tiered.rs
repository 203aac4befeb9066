//! Two-tier read-through cache.
//!
//! A small local tier sits in front of an optional shared tier. Reads
//! check local first and promote shared hits; writes go to both. The
//! shared tier is best-effort: any failure or slow call is logged,
//! counted and treated as a miss.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::error::{CacheError, SharedTierError};
use super::local::{LocalTier, Lookup};
use super::shared::SharedTier;
use crate::clock::instant_after;
use crate::telemetry::metrics;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_local_ttl: Duration,
    pub default_shared_ttl: Duration,
    pub max_local_items: usize,
    /// When false the cache runs local-only, even if a backend is supplied.
    pub shared_tier_enabled: bool,
    /// Namespace for keys written to the shared tier.
    pub key_prefix: String,
    /// Upper bound on each shared-tier call.
    pub shared_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_local_ttl: Duration::from_secs(300),
            default_shared_ttl: Duration::from_secs(3600),
            max_local_items: 1000,
            shared_tier_enabled: true,
            key_prefix: "arcana:".to_string(),
            shared_timeout: Duration::from_millis(500),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub local_hits: u64,
    pub shared_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Local entries found or swept past their expiry.
    pub expired: u64,
    pub shared_errors: u64,
    pub local_items: usize,
    pub max_local_items: usize,
    pub shared_tier_enabled: bool,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.local_hits + self.shared_hits + self.misses
    }

    /// Fraction of lookups served from either tier.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => (self.local_hits + self.shared_hits) as f64 / total as f64,
        }
    }
}

#[derive(Default)]
struct Counters {
    local_hits: AtomicU64,
    shared_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
    shared_errors: AtomicU64,
}

/// Local tier in front of an optional shared tier.
pub struct TieredCache {
    local: Mutex<LocalTier>,
    shared: Option<Arc<dyn SharedTier>>,
    config: CacheConfig,
    counters: Counters,
}

impl TieredCache {
    pub fn new(config: CacheConfig, shared: Option<Arc<dyn SharedTier>>) -> Self {
        let shared = if config.shared_tier_enabled {
            shared
        } else {
            None
        };
        if shared.is_none() {
            tracing::info!("tiered cache running local-only");
        }
        Self {
            local: Mutex::new(LocalTier::new(config.max_local_items)),
            shared,
            config,
            counters: Counters::default(),
        }
    }

    pub fn local_only(config: CacheConfig) -> Self {
        Self::new(config, None)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn has_shared_tier(&self) -> bool {
        self.shared.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let (lookup, generation) = {
            let mut local = self.local.lock();
            local.touch(key);
            let lookup = local.lookup(key, Instant::now());
            let generation = match (&lookup, &self.shared) {
                (Lookup::Hit(_), _) | (_, None) => None,
                (_, Some(_)) => Some(local.begin_read(key)),
            };
            (lookup, generation)
        };
        match lookup {
            Lookup::Hit(value) => {
                self.counters.local_hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("local");
                return Some(value);
            }
            Lookup::Expired => {
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
            }
            Lookup::Absent => {}
        }

        if let (Some(shared), Some(generation)) = (&self.shared, generation) {
            let read = PendingRead {
                local: &self.local,
                key,
                generation,
            };
            let full_key = self.shared_key(key);
            if let Some(value) = self.bounded("get", shared.get(&full_key)).await.flatten() {
                self.counters.shared_hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("shared");
                // Promotion can evict, same as set.
                self.promote(&read, value.clone());
                return Some(value);
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup("miss");
        None
    }

    /// Write to both tiers. `None` TTLs use the configured defaults.
    pub async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        local_ttl: Option<Duration>,
        shared_ttl: Option<Duration>,
    ) {
        let local_ttl = local_ttl.unwrap_or(self.config.default_local_ttl);
        let shared_ttl = shared_ttl.unwrap_or(self.config.default_shared_ttl);

        let Some(shared) = &self.shared else {
            self.insert_local(key, value, local_ttl);
            return;
        };
        self.insert_local(key, value.clone(), local_ttl);
        let full_key = self.shared_key(key);
        self.bounded("set", shared.set(&full_key, &value, shared_ttl)).await;
    }

    pub async fn delete(&self, key: &str) {
        self.local.lock().remove(key);
        if let Some(shared) = &self.shared {
            let full_key = self.shared_key(key);
            self.bounded("delete", shared.delete(&full_key)).await;
        }
    }

    /// Wipe the local tier and this cache's namespace in the shared tier.
    pub async fn clear(&self) {
        self.local.lock().clear();
        metrics::record_cache_size(0);

        let Some(shared) = &self.shared else {
            return;
        };
        let prefix = &self.config.key_prefix;
        let Some(keys) = self.bounded("keys", shared.keys_with_prefix(prefix)).await else {
            return;
        };
        let mut deleted = 0usize;
        for key in keys.iter().filter(|key| key.starts_with(prefix.as_str())) {
            if self.bounded("delete", shared.delete(key)).await.is_some() {
                deleted += 1;
            }
        }
        tracing::info!(prefix = %prefix, deleted, "cache cleared");
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| CacheError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        local_ttl: Option<Duration>,
        shared_ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(CacheError::Encode)?;
        self.set(key, bytes, local_ttl, shared_ttl).await;
        Ok(())
    }

    /// Remove local entries past their expiry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let (removed, remaining) = {
            let mut local = self.local.lock();
            let removed = local.sweep(Instant::now());
            (removed, local.len())
        };
        if removed > 0 {
            self.counters.expired.fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(removed, remaining, "swept expired cache entries");
        }
        metrics::record_cache_size(remaining);
        removed
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(instant_after(Instant::now(), period), period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        tracing::debug!("cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.sweep_expired();
                    }
                }
            }
        })
    }

    pub fn stats(&self) -> CacheStats {
        let (local_items, max_local_items) = {
            let local = self.local.lock();
            (local.len(), local.max_items())
        };
        CacheStats {
            local_hits: self.counters.local_hits.load(Ordering::Relaxed),
            shared_hits: self.counters.shared_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            shared_errors: self.counters.shared_errors.load(Ordering::Relaxed),
            local_items,
            max_local_items,
            shared_tier_enabled: self.shared.is_some(),
        }
    }

    /// Zero the hit, miss and error counters. Entries are untouched.
    pub fn reset_stats(&self) {
        for counter in [
            &self.counters.local_hits,
            &self.counters.shared_hits,
            &self.counters.misses,
            &self.counters.evictions,
            &self.counters.expired,
            &self.counters.shared_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn insert_local(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let (evicted, items) = {
            let mut local = self.local.lock();
            let evicted = local.insert(key, value, ttl, Instant::now());
            (evicted, local.len())
        };
        self.record_insert(evicted, items);
    }

    /// Copy a shared hit into the local tier. Goes through the same evicting
    /// insert as `set`, so a promotion into a full tier evicts too.
    fn promote(&self, read: &PendingRead<'_>, value: Vec<u8>) {
        let ttl = self.config.default_local_ttl;
        let promoted = {
            let mut local = self.local.lock();
            let evicted = local.promote(read.key, value, ttl, Instant::now(), read.generation);
            let items = local.len();
            evicted.map(|evicted| (evicted, items))
        };
        match promoted {
            Some((evicted, items)) => self.record_insert(evicted, items),
            None => tracing::debug!(key = read.key, "key written during shared read; promotion skipped"),
        }
    }

    fn record_insert(&self, evicted: usize, items: usize) {
        if evicted > 0 {
            self.counters.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            metrics::record_cache_eviction(evicted);
        }
        metrics::record_cache_size(items);
    }

    fn shared_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Await a shared-tier call under the configured timeout.
    /// Failures are logged and counted; the caller sees `None`.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, SharedTierError>>,
    ) -> Option<T> {
        let error = match tokio::time::timeout(self.config.shared_timeout, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(_) => SharedTierError::Timeout(self.config.shared_timeout),
        };
        self.counters.shared_errors.fetch_add(1, Ordering::Relaxed);
        metrics::record_shared_error(operation);
        tracing::warn!(operation, error = %error, "shared cache tier degraded");
        None
    }
}

/// An in-flight shared-tier read. Unregisters from the local tier on drop,
/// including when the calling future is cancelled.
struct PendingRead<'a> {
    local: &'a Mutex<LocalTier>,
    key: &'a str,
    generation: u64,
}

impl Drop for PendingRead<'_> {
    fn drop(&mut self) {
        self.local.lock().end_read(self.key);
    }
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("config", &self.config)
            .field("shared_tier", &self.shared.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tiered_tests.rs"]
mod tests;
