//! Grant persistence over a [`KvBackend`].
//!
//! One grant is stored as up to three keys:
//!
//! ```text
//! <prefix>:access:<access token>   -> grant id           (ttl = access)
//! <prefix>:refresh:<refresh token> -> grant id           (ttl = refresh)
//! <prefix>:basic:<grant id>        -> GrantRecord JSON   (ttl = detail)
//! ```
//!
//! Creation commits every key in one atomic batch. Reads and removals follow
//! the pointer to the detail record in two separate round-trips and are not
//! isolated from concurrent removals; a pointer whose detail record vanished
//! in between resolves to `None`, the same as an expired grant.
//!
//! Revoking a refresh token deletes the shared detail record, so a still-live
//! access pointer for the same grant stops resolving. Revoking an access token
//! leaves the refresh token usable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_common::{run_bounded, OpContext};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::backend::{KeyWrite, KvBackend};
use crate::error::StoreResult;
use crate::expiration::GrantExpiry;
use crate::keys::{KeyNamespace, KeyRole};
use crate::model::{GrantRecord, TokenInfo};

/// Timeout applied to an operation when the caller gives no deadline.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(3);

/// Token persistence consumed by the grant-flow engine.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a freshly issued grant, returning its generated id.
    async fn create(&self, info: &dyn TokenInfo, ctx: &OpContext) -> StoreResult<String>;

    /// Grant behind an access token.
    async fn get_by_access(&self, access: &str, ctx: &OpContext)
        -> StoreResult<Option<GrantRecord>>;

    /// Grant behind a refresh token.
    async fn get_by_refresh(
        &self,
        refresh: &str,
        ctx: &OpContext,
    ) -> StoreResult<Option<GrantRecord>>;

    /// Grant behind an authorization code.
    async fn get_by_code(&self, code: &str, ctx: &OpContext) -> StoreResult<Option<GrantRecord>>;

    /// Revoke an access token.
    async fn remove_by_access(&self, access: &str, ctx: &OpContext) -> StoreResult<()>;

    /// Revoke a refresh token together with its grant record.
    async fn remove_by_refresh(&self, refresh: &str, ctx: &OpContext) -> StoreResult<()>;

    /// Revoke an authorization code.
    async fn remove_by_code(&self, code: &str, ctx: &OpContext) -> StoreResult<()>;
}

/// Grant store bound to one backend handle and key namespace.
///
/// The hosting service owns the backend; the store only holds a shared
/// reference to it.
pub struct GrantStore<B: KvBackend + ?Sized> {
    backend: Arc<B>,
    keys: KeyNamespace,
    timeout: Duration,
}

impl<B: KvBackend + ?Sized> Clone for GrantStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            keys: self.keys.clone(),
            timeout: self.timeout,
        }
    }
}

impl<B: KvBackend + ?Sized> GrantStore<B> {
    /// Create a store with the default operation timeout.
    #[must_use]
    pub fn new(backend: Arc<B>, keys: KeyNamespace) -> Self {
        Self {
            backend,
            keys,
            timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Override the timeout applied when callers pass no deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Key namespace in use.
    #[must_use]
    pub const fn keys(&self) -> &KeyNamespace {
        &self.keys
    }

    /// Default operation timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Backend handle.
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Check that the backend answers.
    ///
    /// # Errors
    ///
    /// Returns the backend failure, a timeout or a cancellation.
    pub async fn ping(&self, ctx: &OpContext) -> StoreResult<()> {
        run_bounded(ctx, self.timeout, self.backend.ping()).await?
    }

    /// Persist a grant and return its generated id.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidGrant`](crate::StoreError::InvalidGrant) if a
    ///   key would get a non-positive TTL; nothing is written.
    /// - Backend, timeout or cancellation errors; the batch is then either
    ///   fully applied or not at all.
    pub async fn create<I: TokenInfo + ?Sized>(&self, info: &I) -> StoreResult<String> {
        self.create_with(info, &OpContext::default()).await
    }

    /// [`create`](Self::create) with an explicit deadline or cancellation.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create).
    #[instrument(level = "debug", skip_all)]
    pub async fn create_with<I: TokenInfo + ?Sized>(
        &self,
        info: &I,
        ctx: &OpContext,
    ) -> StoreResult<String> {
        let expiry = GrantExpiry::compute(info, Utc::now())?;
        let record = GrantRecord::from_info(info);
        let payload = serde_json::to_string(&record)?;
        let grant_id = Uuid::new_v4().to_string();

        let writes = self.build_writes(&record, &grant_id, payload, &expiry);
        let key_count = writes.len();

        run_bounded(ctx, self.timeout, self.backend.set_batch(writes)).await??;

        debug!(
            grant_id = %grant_id,
            keys = key_count,
            access_ttl_secs = expiry.access.as_secs(),
            detail_ttl_secs = expiry.detail.as_secs(),
            "grant stored"
        );
        Ok(grant_id)
    }

    fn build_writes(
        &self,
        record: &GrantRecord,
        grant_id: &str,
        payload: String,
        expiry: &GrantExpiry,
    ) -> Vec<KeyWrite> {
        let mut writes = Vec::with_capacity(3);

        if !record.access_token.is_empty() {
            writes.push(KeyWrite::new(
                self.keys.access(&record.access_token),
                grant_id,
                expiry.access,
            ));
        }
        if let Some(ttl) = expiry.refresh {
            writes.push(KeyWrite::new(
                self.keys.refresh(&record.refresh_token),
                grant_id,
                ttl,
            ));
        }
        writes.push(KeyWrite::new(self.keys.basic(grant_id), payload, expiry.detail));

        writes
    }

    /// Grant behind an access token, `None` if either hop misses.
    ///
    /// # Errors
    ///
    /// Backend, timeout, cancellation, or a corrupt stored record.
    pub async fn get_by_access(&self, access: &str) -> StoreResult<Option<GrantRecord>> {
        self.get_by_access_with(access, &OpContext::default()).await
    }

    /// [`get_by_access`](Self::get_by_access) with an explicit context.
    ///
    /// # Errors
    ///
    /// See [`get_by_access`](Self::get_by_access).
    pub async fn get_by_access_with(
        &self,
        access: &str,
        ctx: &OpContext,
    ) -> StoreResult<Option<GrantRecord>> {
        self.resolve(KeyRole::Access, access, ctx).await
    }

    /// Grant behind a refresh token, `None` if either hop misses.
    ///
    /// # Errors
    ///
    /// Backend, timeout, cancellation, or a corrupt stored record.
    pub async fn get_by_refresh(&self, refresh: &str) -> StoreResult<Option<GrantRecord>> {
        self.get_by_refresh_with(refresh, &OpContext::default()).await
    }

    /// [`get_by_refresh`](Self::get_by_refresh) with an explicit context.
    ///
    /// # Errors
    ///
    /// See [`get_by_refresh`](Self::get_by_refresh).
    pub async fn get_by_refresh_with(
        &self,
        refresh: &str,
        ctx: &OpContext,
    ) -> StoreResult<Option<GrantRecord>> {
        self.resolve(KeyRole::Refresh, refresh, ctx).await
    }

    /// Authorization codes are never stored, so this is always `None`.
    ///
    /// # Errors
    ///
    /// Never fails.
    #[allow(clippy::unused_async)]
    pub async fn get_by_code(&self, _code: &str) -> StoreResult<Option<GrantRecord>> {
        Ok(None)
    }

    #[instrument(level = "debug", skip(self, token, ctx))]
    async fn resolve(
        &self,
        role: KeyRole,
        token: &str,
        ctx: &OpContext,
    ) -> StoreResult<Option<GrantRecord>> {
        let pointer = self.keys.key(role, token);
        run_bounded(ctx, self.timeout, self.follow_pointer(&pointer)).await?
    }

    async fn follow_pointer(&self, pointer: &str) -> StoreResult<Option<GrantRecord>> {
        let Some(grant_id) = self.backend.get(pointer).await? else {
            return Ok(None);
        };

        let Some(raw) = self.backend.get(&self.keys.basic(&grant_id)).await? else {
            debug!(grant_id = %grant_id, "pointer outlived its grant record");
            return Ok(None);
        };

        let record: GrantRecord = serde_json::from_str(&raw)?;
        Ok(Some(record))
    }

    /// Revoke an access token. The grant record and any refresh token stay.
    /// Revoking an unknown token succeeds.
    ///
    /// # Errors
    ///
    /// Backend, timeout or cancellation.
    pub async fn remove_by_access(&self, access: &str) -> StoreResult<()> {
        self.remove_by_access_with(access, &OpContext::default()).await
    }

    /// [`remove_by_access`](Self::remove_by_access) with an explicit context.
    ///
    /// # Errors
    ///
    /// See [`remove_by_access`](Self::remove_by_access).
    #[instrument(level = "debug", skip_all)]
    pub async fn remove_by_access_with(&self, access: &str, ctx: &OpContext) -> StoreResult<()> {
        let key = self.keys.access(access);
        let removed = run_bounded(ctx, self.timeout, self.backend.delete(&[key])).await??;
        debug!(removed, "access token revoked");
        Ok(())
    }

    /// Revoke a refresh token and delete the grant record it points to.
    ///
    /// A live access token of the same grant keeps its pointer but no longer
    /// resolves. Revoking an unknown token succeeds.
    ///
    /// # Errors
    ///
    /// Backend, timeout or cancellation.
    pub async fn remove_by_refresh(&self, refresh: &str) -> StoreResult<()> {
        self.remove_by_refresh_with(refresh, &OpContext::default()).await
    }

    /// [`remove_by_refresh`](Self::remove_by_refresh) with an explicit context.
    ///
    /// # Errors
    ///
    /// See [`remove_by_refresh`](Self::remove_by_refresh).
    #[instrument(level = "debug", skip_all)]
    pub async fn remove_by_refresh_with(
        &self,
        refresh: &str,
        ctx: &OpContext,
    ) -> StoreResult<()> {
        let pointer = self.keys.refresh(refresh);
        run_bounded(ctx, self.timeout, self.delete_grant(pointer)).await?
    }

    async fn delete_grant(&self, pointer: String) -> StoreResult<()> {
        let Some(grant_id) = self.backend.get(&pointer).await? else {
            return Ok(());
        };

        let basic = self.keys.basic(&grant_id);
        let removed = self.backend.delete(&[pointer, basic]).await?;
        debug!(grant_id = %grant_id, removed, "refresh token revoked");
        Ok(())
    }

    /// Authorization codes are never stored; always succeeds.
    ///
    /// # Errors
    ///
    /// Never fails.
    #[allow(clippy::unused_async)]
    pub async fn remove_by_code(&self, _code: &str) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<B: KvBackend + ?Sized> TokenStore for GrantStore<B> {
    async fn create(&self, info: &dyn TokenInfo, ctx: &OpContext) -> StoreResult<String> {
        self.create_with(info, ctx).await
    }

    async fn get_by_access(
        &self,
        access: &str,
        ctx: &OpContext,
    ) -> StoreResult<Option<GrantRecord>> {
        self.get_by_access_with(access, ctx).await
    }

    async fn get_by_refresh(
        &self,
        refresh: &str,
        ctx: &OpContext,
    ) -> StoreResult<Option<GrantRecord>> {
        self.get_by_refresh_with(refresh, ctx).await
    }

    async fn get_by_code(&self, code: &str, _ctx: &OpContext) -> StoreResult<Option<GrantRecord>> {
        Self::get_by_code(self, code).await
    }

    async fn remove_by_access(&self, access: &str, ctx: &OpContext) -> StoreResult<()> {
        self.remove_by_access_with(access, ctx).await
    }

    async fn remove_by_refresh(&self, refresh: &str, ctx: &OpContext) -> StoreResult<()> {
        self.remove_by_refresh_with(refresh, ctx).await
    }

    async fn remove_by_code(&self, code: &str, _ctx: &OpContext) -> StoreResult<()> {
        Self::remove_by_code(self, code).await
    }
}
