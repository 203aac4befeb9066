//! Tiered response cache.
//!
//! [`TieredCache`] keeps hot entries in a bounded local tier with
//! approximate-LFU eviction and reads through to an optional
//! [`SharedTier`] backend that outlives the process.

mod error;
mod key;
mod local;
mod shared;
mod tiered;

pub use error::{CacheError, SharedTierError};
pub use key::cache_key;
pub use shared::{MemorySharedTier, SharedTier};
pub use tiered::{CacheConfig, CacheStats, TieredCache};
