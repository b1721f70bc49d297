//! Backing store contract.
//!
//! The grant store needs four things from its key-value store: string `GET`,
//! `DEL`, per-key TTL on write, and an all-or-nothing batch of writes. A miss is
//! `Ok(None)` and never an error.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

/// One `SET key value` with expiry inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyWrite {
    /// Fully namespaced key
    pub key: String,
    /// Value to store
    pub value: String,
    /// Time-to-live, must be non-zero
    pub ttl: Duration,
}

impl KeyWrite {
    /// Create a write.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl,
        }
    }
}

/// Key-value store with TTLs and atomic multi-key writes.
///
/// Implementations must be safe to share across tasks. Only
/// [`KvBackend::set_batch`] has to be atomic; `delete` may remove its keys one
/// by one.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Fetch a value. `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Apply every write or none of them.
    async fn set_batch(&self, writes: Vec<KeyWrite>) -> StoreResult<()>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> StoreResult<u64>;

    /// Round-trip check against the store.
    async fn ping(&self) -> StoreResult<()>;
}
