//! Grant record and the accessor the grant-flow engine hands to the store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read access to an issued grant.
///
/// The grant-flow engine implements this on whatever it builds while handling
/// a token request. Empty token strings mean "not issued"; `None` timestamps
/// mean "not set".
pub trait TokenInfo: Send + Sync {
    /// Client identifier
    fn client_id(&self) -> &str;
    /// Resource owner identifier
    fn user_id(&self) -> &str;
    /// Redirect URI registered with the request
    fn redirect_uri(&self) -> &str;
    /// Granted scope
    fn scope(&self) -> &str;

    /// Authorization code
    fn code(&self) -> &str;
    /// Authorization code creation time
    fn code_created_at(&self) -> Option<DateTime<Utc>>;
    /// Authorization code lifetime
    fn code_expires_in(&self) -> Duration;

    /// Access token
    fn access_token(&self) -> &str;
    /// Access token creation time
    fn access_created_at(&self) -> Option<DateTime<Utc>>;
    /// Access token lifetime
    fn access_expires_in(&self) -> Duration;

    /// Refresh token
    fn refresh_token(&self) -> &str;
    /// Refresh token creation time
    fn refresh_created_at(&self) -> Option<DateTime<Utc>>;
    /// Refresh token lifetime
    fn refresh_expires_in(&self) -> Duration;
}

/// Stored detail record of one grant.
///
/// Serialized once under the `basic` key and shared by the access and refresh
/// pointers. Lifetimes are written as integer nanoseconds so the document
/// stays flat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantRecord {
    /// Client identifier
    pub client_id: String,
    /// Resource owner identifier
    pub user_id: String,
    /// Redirect URI
    pub redirect_uri: String,
    /// Granted scope
    pub scope: String,

    /// Authorization code, always empty in this deployment
    pub code: String,
    /// Authorization code creation time
    pub code_created_at: Option<DateTime<Utc>>,
    /// Authorization code lifetime
    #[serde(with = "duration_nanos")]
    pub code_expires_in: Duration,

    /// Access token
    pub access_token: String,
    /// Access token creation time
    pub access_created_at: Option<DateTime<Utc>>,
    /// Access token lifetime
    #[serde(with = "duration_nanos")]
    pub access_expires_in: Duration,

    /// Refresh token, empty when none was issued
    pub refresh_token: String,
    /// Refresh token creation time
    pub refresh_created_at: Option<DateTime<Utc>>,
    /// Refresh token lifetime
    #[serde(with = "duration_nanos")]
    pub refresh_expires_in: Duration,
}

mod duration_nanos {
    use std::time::Duration;

    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = i64::try_from(value.as_nanos())
            .map_err(|_| S::Error::custom("duration exceeds i64 nanoseconds"))?;
        serializer.serialize_i64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = i64::deserialize(deserializer)?;
        u64::try_from(nanos)
            .map(Duration::from_nanos)
            .map_err(|_| D::Error::custom("negative duration"))
    }
}

impl GrantRecord {
    /// Start a record for `client_id` acting for `user_id`.
    #[must_use]
    pub fn new(client_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Snapshot any accessor into an owned record.
    #[must_use]
    pub fn from_info<I: TokenInfo + ?Sized>(info: &I) -> Self {
        Self {
            client_id: info.client_id().to_string(),
            user_id: info.user_id().to_string(),
            redirect_uri: info.redirect_uri().to_string(),
            scope: info.scope().to_string(),
            code: info.code().to_string(),
            code_created_at: info.code_created_at(),
            code_expires_in: info.code_expires_in(),
            access_token: info.access_token().to_string(),
            access_created_at: info.access_created_at(),
            access_expires_in: info.access_expires_in(),
            refresh_token: info.refresh_token().to_string(),
            refresh_created_at: info.refresh_created_at(),
            refresh_expires_in: info.refresh_expires_in(),
        }
    }

    /// Set the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Attach the access token.
    #[must_use]
    pub fn with_access(
        mut self,
        token: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        self.access_token = token.into();
        self.access_created_at = Some(created_at);
        self.access_expires_in = expires_in;
        self
    }

    /// Attach a refresh token.
    #[must_use]
    pub fn with_refresh(
        mut self,
        token: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        self.refresh_token = token.into();
        self.refresh_created_at = Some(created_at);
        self.refresh_expires_in = expires_in;
        self
    }

    /// Whether a refresh token was issued.
    #[must_use]
    pub fn has_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

impl TokenInfo for GrantRecord {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    fn scope(&self) -> &str {
        &self.scope
    }

    fn code(&self) -> &str {
        &self.code
    }

    fn code_created_at(&self) -> Option<DateTime<Utc>> {
        self.code_created_at
    }

    fn code_expires_in(&self) -> Duration {
        self.code_expires_in
    }

    fn access_token(&self) -> &str {
        &self.access_token
    }

    fn access_created_at(&self) -> Option<DateTime<Utc>> {
        self.access_created_at
    }

    fn access_expires_in(&self) -> Duration {
        self.access_expires_in
    }

    fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    fn refresh_created_at(&self) -> Option<DateTime<Utc>> {
        self.refresh_created_at
    }

    fn refresh_expires_in(&self) -> Duration {
        self.refresh_expires_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> GrantRecord {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        GrantRecord::new("client_1", "user_1")
            .with_scope("read write")
            .with_access("A1", t0, Duration::from_secs(7200))
    }

    #[test]
    fn test_json_is_flat_and_field_named() {
        let json = serde_json::to_value(sample()).unwrap();
        let obj = json.as_object().unwrap();

        for field in [
            "client_id",
            "user_id",
            "redirect_uri",
            "scope",
            "code",
            "code_created_at",
            "code_expires_in",
            "access_token",
            "access_created_at",
            "access_expires_in",
            "refresh_token",
            "refresh_created_at",
            "refresh_expires_in",
        ] {
            assert!(obj.contains_key(field), "missing field {field}");
        }
        assert_eq!(obj["client_id"], "client_1");
        assert_eq!(obj["access_expires_in"], 7_200_000_000_000_u64);
    }

    #[test]
    fn test_empty_fields_survive_round_trip() {
        let record = GrantRecord::default();
        let json = serde_json::to_string(&record).unwrap();
        let back: GrantRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.access_expires_in, Duration::ZERO);
        assert!(back.refresh_created_at.is_none());
    }

    #[test]
    fn test_subsecond_duration_is_preserved() {
        let mut record = sample();
        record.access_expires_in = Duration::from_nanos(1_500_000_001);
        let json = serde_json::to_string(&record).unwrap();
        let back: GrantRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.access_expires_in, Duration::from_nanos(1_500_000_001));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let res = serde_json::from_str::<GrantRecord>(r#"{"access_expires_in":-1}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_duration_limit_is_i64_nanos() {
        let mut record = sample();
        record.access_expires_in = Duration::from_nanos(i64::MAX as u64);
        let json = serde_json::to_string(&record).unwrap();
        let back: GrantRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.access_expires_in, record.access_expires_in);

        record.access_expires_in = Duration::from_nanos(i64::MAX as u64 + 1);
        assert!(serde_json::to_string(&record).is_err());
    }

    #[test]
    fn test_missing_fields_default() {
        let back: GrantRecord = serde_json::from_str(r#"{"client_id":"c"}"#).unwrap();
        assert_eq!(back.client_id, "c");
        assert!(back.access_token.is_empty());
    }

    #[test]
    fn test_from_info_copies_every_field() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let record = sample()
            .with_redirect_uri("https://app.example.com/cb")
            .with_refresh("R1", t0, Duration::from_secs(86400));

        let info: &dyn TokenInfo = &record;
        assert_eq!(GrantRecord::from_info(info), record);
        assert!(record.has_refresh());
    }
}
