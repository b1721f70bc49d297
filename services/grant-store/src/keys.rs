//! Namespaced store keys.
//!
//! Layout under a prefix such as `myToken`:
//! - `myToken:access:<token>` holds a grant id
//! - `myToken:refresh:<token>` holds a grant id
//! - `myToken:basic:<grant id>` holds the serialized grant record

use std::fmt;

/// Role segment of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    /// Access token pointer
    Access,
    /// Refresh token pointer
    Refresh,
    /// Shared grant detail record
    Basic,
}

impl KeyRole {
    /// Segment written into the key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::Basic => "basic",
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds keys under a single namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    /// Create a namespace. An empty prefix yields bare `role:id` keys.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key for `role` and `id`.
    #[must_use]
    pub fn key(&self, role: KeyRole, id: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}:{}", role.as_str(), id)
        } else {
            format!("{}:{}:{}", self.prefix, role.as_str(), id)
        }
    }

    /// Access pointer key.
    #[must_use]
    pub fn access(&self, token: &str) -> String {
        self.key(KeyRole::Access, token)
    }

    /// Refresh pointer key.
    #[must_use]
    pub fn refresh(&self, token: &str) -> String {
        self.key(KeyRole::Refresh, token)
    }

    /// Detail record key.
    #[must_use]
    pub fn basic(&self, grant_id: &str) -> String {
        self.key(KeyRole::Basic, grant_id)
    }
}

impl Default for KeyNamespace {
    fn default() -> Self {
        Self::new("myToken")
    }
}
