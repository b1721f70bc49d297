//! Time-to-live derivation for the keys of one grant.
//!
//! With only an access token every key lives for the access lifetime. With a
//! refresh token the refresh window, measured from the access creation time,
//! drives the detail record and caps the access pointer:
//!
//! ```text
//! rexp   = (refresh_created_at + refresh_expires_in) - access_created_at
//! access = min(access_expires_in, rexp)
//! detail = rexp
//! ```

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{StoreError, StoreResult};
use crate::model::TokenInfo;

/// TTLs for the keys written by one `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantExpiry {
    /// Access pointer TTL
    pub access: Duration,
    /// Refresh pointer TTL, `None` without a refresh token
    pub refresh: Option<Duration>,
    /// Detail record TTL
    pub detail: Duration,
}

impl GrantExpiry {
    /// Derive TTLs for `info`. A missing access creation time means `now`;
    /// a missing refresh creation time means the access creation time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidGrant`] when a key that would be written
    /// ends up with a zero or negative TTL, or the arithmetic overflows.
    pub fn compute<I: TokenInfo + ?Sized>(info: &I, now: DateTime<Utc>) -> StoreResult<Self> {
        let created = info.access_created_at().unwrap_or(now);
        let aexp = info.access_expires_in();

        let expiry = if info.refresh_token().is_empty() {
            Self {
                access: aexp,
                refresh: None,
                detail: aexp,
            }
        } else {
            let rexp = refresh_window(
                created,
                info.refresh_created_at().unwrap_or(created),
                info.refresh_expires_in(),
            )?;
            Self {
                access: aexp.min(rexp),
                refresh: Some(rexp),
                detail: rexp,
            }
        };

        if expiry.detail.is_zero() {
            return Err(StoreError::invalid_grant("grant has no lifetime"));
        }
        if !info.access_token().is_empty() && expiry.access.is_zero() {
            return Err(StoreError::invalid_grant("access token has no lifetime"));
        }

        Ok(expiry)
    }

    /// Longest pointer TTL.
    #[must_use]
    pub fn longest_pointer(&self) -> Duration {
        self.refresh.map_or(self.access, |r| r.max(self.access))
    }
}

fn refresh_window(
    access_created: DateTime<Utc>,
    refresh_created: DateTime<Utc>,
    refresh_expires_in: Duration,
) -> StoreResult<Duration> {
    let lifetime = TimeDelta::from_std(refresh_expires_in)
        .map_err(|_| StoreError::invalid_grant("refresh lifetime out of range"))?;
    let ends = refresh_created
        .checked_add_signed(lifetime)
        .ok_or_else(|| StoreError::invalid_grant("refresh expiry out of range"))?;

    (ends - access_created)
        .to_std()
        .map_err(|_| StoreError::invalid_grant("refresh token expires before the grant was issued"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GrantRecord;
    use chrono::TimeZone;

    const HOUR: Duration = Duration::from_secs(3600);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_access_only() {
        let grant = GrantRecord::new("c", "u").with_access("A1", t0(), 2 * HOUR);
        let exp = GrantExpiry::compute(&grant, t0()).unwrap();

        assert_eq!(exp.access, 2 * HOUR);
        assert_eq!(exp.refresh, None);
        assert_eq!(exp.detail, 2 * HOUR);
    }

    #[test]
    fn test_refresh_longer_than_access() {
        let grant = GrantRecord::new("c", "u")
            .with_access("A2", t0(), 2 * HOUR)
            .with_refresh("R2", t0(), 24 * HOUR);
        let exp = GrantExpiry::compute(&grant, t0()).unwrap();

        assert_eq!(exp.access, 2 * HOUR);
        assert_eq!(exp.refresh, Some(24 * HOUR));
        assert_eq!(exp.detail, 24 * HOUR);
    }

    #[test]
    fn test_refresh_caps_access() {
        let grant = GrantRecord::new("c", "u")
            .with_access("A", t0(), 2 * HOUR)
            .with_refresh("R", t0(), HOUR);
        let exp = GrantExpiry::compute(&grant, t0()).unwrap();

        assert_eq!(exp.access, HOUR);
        assert_eq!(exp.refresh, Some(HOUR));
        assert_eq!(exp.detail, HOUR);
    }

    #[test]
    fn test_refresh_window_measured_from_access_creation() {
        // Refresh token minted 30 minutes after the access token.
        let grant = GrantRecord::new("c", "u")
            .with_access("A", t0(), 2 * HOUR)
            .with_refresh("R", t0() + TimeDelta::minutes(30), HOUR);
        let exp = GrantExpiry::compute(&grant, t0()).unwrap();

        assert_eq!(exp.refresh, Some(Duration::from_secs(90 * 60)));
        assert_eq!(exp.access, Duration::from_secs(90 * 60));
    }

    #[test]
    fn test_missing_access_creation_uses_now() {
        let mut grant = GrantRecord::new("c", "u").with_refresh("R", t0(), 24 * HOUR);
        grant.access_token = "A".to_string();
        grant.access_expires_in = 2 * HOUR;

        let exp = GrantExpiry::compute(&grant, t0() + TimeDelta::hours(4)).unwrap();
        assert_eq!(exp.refresh, Some(20 * HOUR));
        assert_eq!(exp.access, 2 * HOUR);
    }

    #[test]
    fn test_missing_refresh_creation_uses_access_creation() {
        let mut grant = GrantRecord::new("c", "u").with_access("A", t0(), HOUR);
        grant.refresh_token = "R".to_string();
        grant.refresh_expires_in = 3 * HOUR;

        let exp = GrantExpiry::compute(&grant, t0()).unwrap();
        assert_eq!(exp.refresh, Some(3 * HOUR));
    }

    #[test]
    fn test_expired_refresh_rejected() {
        let grant = GrantRecord::new("c", "u")
            .with_access("A", t0(), HOUR)
            .with_refresh("R", t0() - TimeDelta::hours(3), HOUR);

        let err = GrantExpiry::compute(&grant, t0()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidGrant(_)));
    }

    #[test]
    fn test_zero_access_lifetime_rejected() {
        let grant = GrantRecord::new("c", "u").with_access("A", t0(), Duration::ZERO);
        assert!(GrantExpiry::compute(&grant, t0()).is_err());
    }

    #[test]
    fn test_detail_dominates_pointers() {
        let grant = GrantRecord::new("c", "u")
            .with_access("A", t0(), 5 * HOUR)
            .with_refresh("R", t0(), 3 * HOUR);
        let exp = GrantExpiry::compute(&grant, t0()).unwrap();

        assert!(exp.detail >= exp.longest_pointer());
    }
}
