//! In-process backend with TTL expiry.
//!
//! Expiry uses `tokio::time::Instant`, so tests running on a paused clock can
//! jump hours ahead with `tokio::time::advance`. Outages and latency can be
//! injected to exercise timeout and error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{KeyWrite, KvBackend};
use crate::error::{StoreError, StoreResult};

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory [`KvBackend`].
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Remaining TTL of a live key.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.expires_at - now)
    }

    /// Whether `key` is live.
    pub async fn contains(&self, key: &str) -> bool {
        self.ttl(key).await.is_some()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    /// Whether no key is live.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Live keys starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Store a raw value outside of any batch, e.g. to plant a corrupt record.
    pub async fn put_raw(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn enter(&self) -> StoreResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::backend("memory backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.enter().await?;
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set_batch(&self, writes: Vec<KeyWrite>) -> StoreResult<()> {
        self.enter().await?;
        if let Some(bad) = writes.iter().find(|w| w.ttl.is_zero()) {
            return Err(StoreError::invalid_grant(format!(
                "zero ttl for key {}",
                bad.key
            )));
        }

        // Single write guard: readers see all of the batch or none of it.
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, e| e.is_live(now));
        for write in writes {
            entries.insert(
                write.key,
                Entry {
                    value: write.value,
                    expires_at: now + write.ttl,
                },
            );
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<u64> {
        self.enter().await?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let removed = keys
            .iter()
            .filter_map(|k| entries.remove(k))
            .filter(|e| e.is_live(now))
            .count();
        Ok(removed as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.enter().await
    }
}
