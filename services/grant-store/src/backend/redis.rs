//! Redis [`KvBackend`] over a shared `ConnectionManager`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use super::{KeyWrite, KvBackend};
use crate::error::{StoreError, StoreResult};

/// Redis-backed [`KvBackend`].
///
/// The connection manager is cheap to clone and reconnects on its own, so the
/// hosting service creates one backend and shares it behind an `Arc`.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connect to `redis_url` and verify the server answers `PING`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BackendUnavailable`] if the URL is invalid or the
    /// server cannot be reached.
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::backend(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client).await?;

        let backend = Self { conn };
        backend.ping().await?;
        Ok(backend)
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

/// Millisecond expiry for `SET ... PX`, rounded up so sub-millisecond TTLs
/// never become zero.
fn ttl_millis(ttl: Duration) -> StoreResult<u64> {
    u64::try_from(ttl.as_nanos().div_ceil(1_000_000))
        .map_err(|_| StoreError::invalid_grant("ttl out of range"))
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_batch(&self, writes: Vec<KeyWrite>) -> StoreResult<()> {
        if writes.is_empty() {
            return Ok(());
        }

        // MULTI/EXEC: queued commands become visible together or not at all.
        let mut pipe = redis::pipe();
        pipe.atomic();
        for write in &writes {
            let millis = ttl_millis(write.ttl)?;
            if millis == 0 {
                return Err(StoreError::invalid_grant(format!(
                    "zero ttl for key {}",
                    write.key
                )));
            }
            pipe.cmd("SET")
                .arg(&write.key)
                .arg(&write.value)
                .arg("PX")
                .arg(millis)
                .ignore();
        }

        let mut conn = self.conn.clone();
        let (): () = pipe.query_async(&mut conn).await?;
        debug!(keys = writes.len(), "redis batch committed");
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::backend(format!("unexpected PING reply: {pong}")))
        }
    }
}
