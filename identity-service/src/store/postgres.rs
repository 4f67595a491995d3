//! Postgres credential store.
//!
//! Row-level locking on the lockout counter comes from the atomic
//! `UPDATE ... RETURNING`; no in-process locking is layered on top.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Company, Identity, IdentityClaim, SystemRole, TokenKind, VerificationToken,
};

use super::{CredentialStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS identities (
    id UUID PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT,
    email_confirmed BOOLEAN NOT NULL DEFAULT FALSE,
    two_factor_enabled BOOLEAN NOT NULL DEFAULT FALSE,
    lockout_end TIMESTAMPTZ,
    failed_attempts INTEGER NOT NULL DEFAULT 0,
    company_id UUID,
    is_company_owner BOOLEAN NOT NULL DEFAULT FALSE,
    display_name TEXT,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS roles (
    name TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS identity_roles (
    user_id UUID NOT NULL REFERENCES identities(id),
    role_name TEXT NOT NULL REFERENCES roles(name),
    PRIMARY KEY (user_id, role_name)
);
CREATE TABLE IF NOT EXISTS identity_claims (
    user_id UUID NOT NULL REFERENCES identities(id),
    claim_type TEXT NOT NULL,
    claim_value TEXT NOT NULL,
    PRIMARY KEY (user_id, claim_type, claim_value)
);
CREATE TABLE IF NOT EXISTS identity_logins (
    provider TEXT NOT NULL,
    provider_key TEXT NOT NULL,
    user_id UUID NOT NULL REFERENCES identities(id),
    PRIMARY KEY (provider, provider_key)
);
CREATE TABLE IF NOT EXISTS companies (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    tax_id TEXT NOT NULL UNIQUE,
    enabled BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS verification_tokens (
    token TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    user_id UUID NOT NULL REFERENCES identities(id),
    expires_at TIMESTAMPTZ NOT NULL
);
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create tables and seed the system role set. Idempotent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        for role in SystemRole::ALL {
            sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

fn map_insert_err(err: sqlx::Error, what: &'static str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(what),
        _ => err.into(),
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let identity = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(identity)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let identity =
            sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE lower(email) = lower($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(identity)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        let identity =
            sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(identity)
    }

    async fn find_by_external_link(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<Identity>, StoreError> {
        let identity = sqlx::query_as::<_, Identity>(
            "SELECT i.* FROM identities i
             JOIN identity_logins l ON l.user_id = i.id
             WHERE l.provider = $1 AND l.provider_key = $2",
        )
        .bind(provider)
        .bind(provider_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(identity)
    }

    async fn create_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO identities
             (id, username, email, password_hash, email_confirmed, two_factor_enabled,
              lockout_end, failed_attempts, company_id, is_company_owner, display_name, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(identity.id)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(identity.email_confirmed)
        .bind(identity.two_factor_enabled)
        .bind(identity.lockout_end)
        .bind(identity.failed_attempts)
        .bind(identity.company_id)
        .bind(identity.is_company_owner)
        .bind(&identity.display_name)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "email"))?;
        Ok(())
    }

    async fn update_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE identities SET
             username = $2, email = $3, password_hash = $4, email_confirmed = $5,
             two_factor_enabled = $6, lockout_end = $7, failed_attempts = $8,
             company_id = $9, is_company_owner = $10, display_name = $11
             WHERE id = $1",
        )
        .bind(identity.id)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(identity.email_confirmed)
        .bind(identity.two_factor_enabled)
        .bind(identity.lockout_end)
        .bind(identity.failed_attempts)
        .bind(identity.company_id)
        .bind(identity.is_company_owner)
        .bind(&identity.display_name)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn add_external_link(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_key: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO identity_logins (provider, provider_key, user_id)
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(provider)
        .bind(provider_key)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_failed_attempts(&self, user_id: Uuid) -> Result<i32, StoreError> {
        let count: Option<i32> = sqlx::query_scalar(
            "UPDATE identities SET failed_attempts = failed_attempts + 1
             WHERE id = $1 RETURNING failed_attempts",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        count.ok_or(StoreError::NotFound)
    }

    async fn set_lockout(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE identities SET lockout_end = $2 WHERE id = $1")
            .bind(user_id)
            .bind(until)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn reset_failed_attempts(&self, user_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE identities SET failed_attempts = 0, lockout_end = NULL WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_roles(&self, user_id: Uuid) -> Result<Vec<String>, StoreError> {
        let roles: Vec<String> = sqlx::query_scalar(
            "SELECT role_name FROM identity_roles WHERE user_id = $1 ORDER BY role_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn add_to_role(&self, user_id: Uuid, role: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO identity_roles (user_id, role_name)
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_from_roles(&self, user_id: Uuid, roles: &[String]) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM identity_roles WHERE user_id = $1 AND role_name = ANY($2)")
            .bind(user_id)
            .bind(roles)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn role_exists(&self, role: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM roles WHERE name = $1)")
                .bind(role)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn get_claims(&self, user_id: Uuid) -> Result<Vec<IdentityClaim>, StoreError> {
        let claims = sqlx::query_as::<_, IdentityClaim>(
            "SELECT claim_type, claim_value FROM identity_claims WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(claims)
    }

    async fn add_claims(&self, user_id: Uuid, claims: &[IdentityClaim]) -> Result<(), StoreError> {
        for claim in claims {
            sqlx::query(
                "INSERT INTO identity_claims (user_id, claim_type, claim_value)
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(&claim.claim_type)
            .bind(&claim.claim_value)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn remove_claims(
        &self,
        user_id: Uuid,
        claims: &[IdentityClaim],
    ) -> Result<(), StoreError> {
        for claim in claims {
            sqlx::query(
                "DELETE FROM identity_claims
                 WHERE user_id = $1 AND claim_type = $2 AND claim_value = $3",
            )
            .bind(user_id)
            .bind(&claim.claim_type)
            .bind(&claim.claim_value)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn create_company(&self, company: &Company) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO companies (id, name, tax_id, enabled, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(company.id)
        .bind(&company.name)
        .bind(&company.tax_id)
        .bind(company.enabled)
        .bind(company.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "tax_id"))?;
        Ok(())
    }

    async fn delete_company(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_company(&self, id: Uuid) -> Result<Option<Company>, StoreError> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(company)
    }

    async fn update_company(&self, company: &Company) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE companies SET name = $2, tax_id = $3, enabled = $4 WHERE id = $1",
        )
        .bind(company.id)
        .bind(&company.name)
        .bind(&company.tax_id)
        .bind(company.enabled)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn save_verification_token(&self, token: &VerificationToken) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO verification_tokens (token, kind, user_id, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&token.token)
        .bind(token.kind.as_str())
        .bind(token.user_id)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take_verification_token(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let row: Option<(String, Uuid, DateTime<Utc>)> = sqlx::query_as(
            "DELETE FROM verification_tokens
             WHERE token = $1 AND kind = $2
             RETURNING token, user_id, expires_at",
        )
        .bind(token)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(token, user_id, expires_at)| VerificationToken {
            token,
            kind,
            user_id,
            expires_at,
        }))
    }
}
