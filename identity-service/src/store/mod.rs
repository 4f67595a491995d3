//! Credential store abstraction.
//!
//! The core depends only on this trait; persistence technology is a
//! substitutable collaborator. `memory` backs tests and local development,
//! `postgres` backs deployments.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Company, Identity, IdentityClaim, TokenKind, VerificationToken};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Store failures. "Not found" is signalled distinctly from transport or
/// storage faults so callers can translate it without string matching.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Backend(anyhow::Error::new(other)),
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    // Identity lookup and lifecycle
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError>;
    async fn find_by_external_link(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<Identity>, StoreError>;
    async fn create_identity(&self, identity: &Identity) -> Result<(), StoreError>;
    async fn update_identity(&self, identity: &Identity) -> Result<(), StoreError>;
    async fn add_external_link(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_key: &str,
    ) -> Result<(), StoreError>;

    // Lockout bookkeeping. The increment is a serialized read-modify-write
    // at the store so concurrent failures never lose counts.
    async fn increment_failed_attempts(&self, user_id: Uuid) -> Result<i32, StoreError>;
    async fn set_lockout(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<(), StoreError>;
    async fn reset_failed_attempts(&self, user_id: Uuid) -> Result<(), StoreError>;

    // Role membership
    async fn get_roles(&self, user_id: Uuid) -> Result<Vec<String>, StoreError>;
    async fn add_to_role(&self, user_id: Uuid, role: &str) -> Result<(), StoreError>;
    async fn remove_from_roles(&self, user_id: Uuid, roles: &[String]) -> Result<(), StoreError>;
    async fn role_exists(&self, role: &str) -> Result<bool, StoreError>;

    // Claims
    async fn get_claims(&self, user_id: Uuid) -> Result<Vec<IdentityClaim>, StoreError>;
    async fn add_claims(&self, user_id: Uuid, claims: &[IdentityClaim]) -> Result<(), StoreError>;
    async fn remove_claims(
        &self,
        user_id: Uuid,
        claims: &[IdentityClaim],
    ) -> Result<(), StoreError>;

    // Companies
    async fn create_company(&self, company: &Company) -> Result<(), StoreError>;
    async fn delete_company(&self, id: Uuid) -> Result<(), StoreError>;
    async fn find_company(&self, id: Uuid) -> Result<Option<Company>, StoreError>;
    async fn update_company(&self, company: &Company) -> Result<(), StoreError>;

    // Opaque verification-token lifecycle (single use)
    async fn save_verification_token(&self, token: &VerificationToken) -> Result<(), StoreError>;
    /// Atomically remove and return the token if it exists with the given kind.
    async fn take_verification_token(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<VerificationToken>, StoreError>;
}
