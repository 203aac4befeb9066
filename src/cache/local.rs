//! Local (in-process) cache tier.
//!
//! Entries and their access counters live in one structure so that
//! capacity check, eviction and insert happen as a single unit under the
//! owning lock.
//!
//! Keys with a shared-tier read in flight carry a write generation. Writes
//! bump it, and a read only promotes its result if the generation it saw
//! is unchanged, so a slow read never resurrects or overwrites newer data.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::clock::instant_after;

/// Fraction of capacity evicted when a new key arrives at a full tier.
const EVICTION_FRACTION: f64 = 0.2;

/// Counters kept per resident slot before those of absent keys are pruned.
const COUNTER_HEADROOM: usize = 4;

#[derive(Debug, Clone)]
struct LocalEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl LocalEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Result of a local lookup.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Lookup {
    Hit(Vec<u8>),
    /// Present but past expiry; the entry has been removed.
    Expired,
    Absent,
}

#[derive(Debug, Default)]
struct PendingRead {
    readers: usize,
    generation: u64,
}

pub(crate) struct LocalTier {
    entries: HashMap<String, LocalEntry>,
    access_counts: HashMap<String, u64>,
    pending: HashMap<String, PendingRead>,
    max_items: usize,
}

impl LocalTier {
    pub(crate) fn new(max_items: usize) -> Self {
        let max_items = max_items.max(1);
        Self {
            entries: HashMap::with_capacity(max_items),
            access_counts: HashMap::new(),
            pending: HashMap::new(),
            max_items,
        }
    }

    /// Bump the access counter used for eviction scoring.
    ///
    /// Misses count too, so counters can outnumber entries. Once they reach
    /// `COUNTER_HEADROOM` times capacity, those of absent keys are dropped.
    pub(crate) fn touch(&mut self, key: &str) {
        if let Some(count) = self.access_counts.get_mut(key) {
            *count += 1;
            return;
        }
        if self.access_counts.len() >= self.counter_limit() {
            self.prune_counters();
        }
        self.access_counts.insert(key.to_string(), 1);
    }

    pub(crate) fn lookup(&mut self, key: &str, now: Instant) -> Lookup {
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => Lookup::Hit(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                Lookup::Expired
            }
            None => Lookup::Absent,
        }
    }

    /// Insert or overwrite. Returns the number of entries evicted to make room.
    pub(crate) fn insert(&mut self, key: &str, value: Vec<u8>, ttl: Duration, now: Instant) -> usize {
        self.mark_written(key);
        self.store(key, value, ttl, now)
    }

    /// Register a shared-tier read of `key` and return the generation it
    /// must still see to promote. Pair with [`end_read`](Self::end_read).
    pub(crate) fn begin_read(&mut self, key: &str) -> u64 {
        let pending = self.pending.entry(key.to_string()).or_default();
        pending.readers += 1;
        pending.generation
    }

    pub(crate) fn end_read(&mut self, key: &str) {
        if let Some(pending) = self.pending.get_mut(key) {
            pending.readers = pending.readers.saturating_sub(1);
            if pending.readers == 0 {
                self.pending.remove(key);
            }
        }
    }

    /// Store a value fetched from the shared tier, unless `key` was written,
    /// deleted or cleared since `generation` was taken. Returns the eviction
    /// count, or `None` when the value is stale.
    pub(crate) fn promote(
        &mut self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
        now: Instant,
        generation: u64,
    ) -> Option<usize> {
        let current = self.pending.get(key).map(|pending| pending.generation);
        if current != Some(generation) {
            return None;
        }
        Some(self.store(key, value, ttl, now))
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.mark_written(key);
        self.access_counts.remove(key);
        self.entries.remove(key).is_some()
    }

    pub(crate) fn clear(&mut self) {
        for pending in self.pending.values_mut() {
            pending.generation += 1;
        }
        self.entries.clear();
        self.access_counts.clear();
    }

    /// Drop every entry past its expiry, along with its counter. Counters of
    /// keys that are not resident go too.
    pub(crate) fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.prune_counters();
        before - self.entries.len()
    }

    fn store(&mut self, key: &str, value: Vec<u8>, ttl: Duration, now: Instant) -> usize {
        let evicted = if !self.entries.contains_key(key) && self.entries.len() >= self.max_items {
            self.evict()
        } else {
            0
        };
        let entry = LocalEntry {
            value,
            expires_at: instant_after(now, ttl),
        };
        self.entries.insert(key.to_string(), entry);
        evicted
    }

    fn mark_written(&mut self, key: &str) {
        if let Some(pending) = self.pending.get_mut(key) {
            pending.generation += 1;
        }
    }

    fn counter_limit(&self) -> usize {
        self.max_items.saturating_mul(COUNTER_HEADROOM)
    }

    fn prune_counters(&mut self) {
        let entries = &self.entries;
        self.access_counts.retain(|key, _| entries.contains_key(key));
    }

    pub(crate) fn eviction_batch(&self) -> usize {
        (self.max_items as f64 * EVICTION_FRACTION).ceil() as usize
    }

    /// Remove the least-accessed resident keys. Ties fall to iteration order.
    fn evict(&mut self) -> usize {
        let mut ranked: Vec<(&String, u64)> = self
            .entries
            .keys()
            .map(|key| (key, self.access_counts.get(key).copied().unwrap_or(0)))
            .collect();
        ranked.sort_by_key(|(_, count)| *count);
        let victims: Vec<String> = ranked
            .into_iter()
            .take(self.eviction_batch())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &victims {
            self.entries.remove(key);
            self.access_counts.remove(key);
        }
        tracing::debug!(evicted = victims.len(), "local cache tier at capacity");
        victims.len()
    }

    #[cfg(test)]
    pub(crate) fn access_count(&self, key: &str) -> u64 {
        self.access_counts.get(key).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[cfg(test)]
    pub(crate) fn tracked_counters(&self) -> usize {
        self.access_counts.len()
    }

    #[cfg(test)]
    pub(crate) fn pending_reads(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn max_items(&self) -> usize {
        self.max_items
    }
}
