//! Grant Store library.
//!
//! Persists OAuth2 access/refresh token grants in a TTL-capable key-value
//! store: two pointer keys per grant reference one shared detail record, all
//! written in a single atomic batch.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod expiration;
pub mod keys;
pub mod model;
pub mod store;

// Re-exports for convenience
pub use backend::{KeyWrite, KvBackend, MemoryBackend, RedisBackend};
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use expiration::GrantExpiry;
pub use keys::{KeyNamespace, KeyRole};
pub use model::{GrantRecord, TokenInfo};
pub use rust_common::OpContext;
pub use store::{GrantStore, TokenStore, DEFAULT_OP_TIMEOUT};
