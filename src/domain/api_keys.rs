//! Domain types for API keys.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::Role;

/// Derived lifecycle state; keys only persist timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    Active,
    Revoked,
    Expired,
}

impl ApiKeyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prefix: String,
    #[serde(skip)]
    pub hashed_secret: Vec<u8>,
    pub roles: Vec<Role>,
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_by: String,
    pub created_at: OffsetDateTime,
}

impl ApiKeyRecord {
    pub fn status_at(&self, now: OffsetDateTime) -> ApiKeyStatus {
        if self.revoked_at.is_some() {
            return ApiKeyStatus::Revoked;
        }
        match self.expires_at {
            Some(expires_at) if expires_at <= now => ApiKeyStatus::Expired,
            _ => ApiKeyStatus::Active,
        }
    }

    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        self.status_at(now) == ApiKeyStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn key() -> ApiKeyRecord {
        ApiKeyRecord {
            id: Uuid::new_v4(),
            name: "ops".into(),
            description: None,
            prefix: "abc".into(),
            hashed_secret: vec![],
            roles: vec![Role::Viewer],
            expires_at: None,
            revoked_at: None,
            last_used_at: None,
            created_by: "cli".into(),
            created_at: datetime!(2024-01-01 0:00 UTC),
        }
    }

    #[test]
    fn revocation_wins_over_expiry() {
        let now = datetime!(2024-06-01 0:00 UTC);
        let mut record = key();
        assert!(record.is_active_at(now));

        record.expires_at = Some(datetime!(2024-05-01 0:00 UTC));
        assert_eq!(record.status_at(now), ApiKeyStatus::Expired);

        record.revoked_at = Some(datetime!(2024-04-01 0:00 UTC));
        assert_eq!(record.status_at(now), ApiKeyStatus::Revoked);
    }
}
