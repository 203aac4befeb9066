//! Shared (cross-process) cache tier.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::error::SharedTierError;
use crate::clock::instant_after;

/// Backend for the shared tier, typically a networked key-value store.
///
/// Keys passed in already carry the cache's namespace prefix.
#[async_trait]
pub trait SharedTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SharedTierError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), SharedTierError>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), SharedTierError>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, SharedTierError>;
}

struct SharedEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process shared tier for single-node deployments and tests.
#[derive(Default)]
pub struct MemorySharedTier {
    entries: DashMap<String, SharedEntry>,
}

impl MemorySharedTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries stored, including any not yet reaped after expiry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SharedTier for MemorySharedTier {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SharedTierError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if now < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| now >= entry.expires_at);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), SharedTierError> {
        let entry = SharedEntry {
            value: value.to_vec(),
            expires_at: instant_after(Instant::now(), ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SharedTierError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, SharedTierError> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && now < entry.expires_at)
            .map(|entry| entry.key().clone())
            .collect())
    }
}
