//! Identity model - an authenticable account, independent of tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Identity entity.
///
/// The `(company_id, is_company_owner)` pair is always written together;
/// an identity owns at most one company. `password_hash` is absent for
/// accounts created through an external provider that never set one.
#[derive(Debug, Clone, FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub email_confirmed: bool,
    pub two_factor_enabled: bool,
    pub lockout_end: Option<DateTime<Utc>>,
    pub failed_attempts: i32,
    pub company_id: Option<Uuid>,
    pub is_company_owner: bool,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new local-credential identity.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: Some(password_hash),
            email_confirmed: false,
            two_factor_enabled: false,
            lockout_end: None,
            failed_attempts: 0,
            company_id: None,
            is_company_owner: false,
            display_name: None,
            created_at: Utc::now(),
        }
    }

    /// Create an identity from an external-provider assertion. Providers are
    /// treated as having already verified email ownership.
    pub fn new_external(username: String, email: String, display_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: None,
            email_confirmed: true,
            two_factor_enabled: false,
            lockout_end: None,
            failed_attempts: 0,
            company_id: None,
            is_company_owner: false,
            display_name,
            created_at: Utc::now(),
        }
    }

    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_end.map(|end| end > now).unwrap_or(false)
    }

    /// Set or clear the company association. Both fields move together.
    pub fn set_company(&mut self, company: Option<(Uuid, bool)>) {
        match company {
            Some((id, owner)) => {
                self.company_id = Some(id);
                self.is_company_owner = owner;
            }
            None => {
                self.company_id = None;
                self.is_company_owner = false;
            }
        }
    }

    pub fn sanitized(&self) -> IdentityResponse {
        IdentityResponse::from(self.clone())
    }
}

/// Identity response for the API (no credential material).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub email_confirmed: bool,
    pub company_id: Option<Uuid>,
    pub is_company_owner: bool,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for IdentityResponse {
    fn from(i: Identity) -> Self {
        Self {
            id: i.id,
            username: i.username,
            email: i.email,
            email_confirmed: i.email_confirmed,
            company_id: i.company_id,
            is_company_owner: i.is_company_owner,
            display_name: i.display_name,
            created_at: i.created_at,
        }
    }
}

/// External-provider link on an identity.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ExternalLink {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn lockout_expires() {
        let mut identity = Identity::new("bob".into(), "bob@example.com".into(), "h".into());
        let now = Utc::now();
        identity.lockout_end = Some(now + Duration::minutes(5));
        assert!(identity.is_locked_out(now));
        assert!(!identity.is_locked_out(now + Duration::minutes(6)));
    }

    #[test]
    fn company_pair_moves_together() {
        let mut identity = Identity::new("bob".into(), "bob@example.com".into(), "h".into());
        let company = Uuid::new_v4();
        identity.set_company(Some((company, true)));
        assert_eq!(identity.company_id, Some(company));
        assert!(identity.is_company_owner);

        identity.set_company(None);
        assert_eq!(identity.company_id, None);
        assert!(!identity.is_company_owner);
    }
}
