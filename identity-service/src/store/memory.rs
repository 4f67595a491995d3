//! In-memory credential store.
//!
//! Backs tests and local development. A single mutex serializes every
//! operation, which also gives the lockout counter its read-modify-write
//! guarantee.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{Company, Identity, IdentityClaim, SystemRole, TokenKind, VerificationToken};

use super::{CredentialStore, StoreError};

#[derive(Default)]
struct Inner {
    identities: HashMap<Uuid, Identity>,
    links: HashMap<(String, String), Uuid>,
    roles: HashMap<Uuid, HashSet<String>>,
    claims: HashMap<Uuid, HashSet<IdentityClaim>>,
    companies: HashMap<Uuid, Company>,
    tokens: HashMap<String, VerificationToken>,
    known_roles: HashSet<String>,
}

pub struct InMemoryStore {
    inner: Mutex<Inner>,
    fail_next_identity_update: AtomicBool,
    fail_next_role_add: AtomicBool,
    fail_next_identity_lookup: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for role in SystemRole::ALL {
            inner.known_roles.insert(role.as_str().to_string());
        }
        Self {
            inner: Mutex::new(inner),
            fail_next_identity_update: AtomicBool::new(false),
            fail_next_role_add: AtomicBool::new(false),
            fail_next_identity_lookup: AtomicBool::new(false),
        }
    }

    /// Make the next `update_identity` call fail once. Used by tests that
    /// exercise the multi-step compensation paths.
    pub fn fail_next_identity_update(&self) {
        self.fail_next_identity_update.store(true, Ordering::SeqCst);
    }

    /// Make the next `add_to_role` call fail once.
    pub fn fail_next_role_add(&self) {
        self.fail_next_role_add.store(true, Ordering::SeqCst);
    }

    /// Make the next `find_by_id` call fail once. Used by tests asserting a
    /// code path never consults the store.
    pub fn fail_next_identity_lookup(&self) {
        self.fail_next_identity_lookup.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        if self.fail_next_identity_lookup.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "injected identity lookup failure"
            )));
        }
        Ok(self.lock().identities.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .identities
            .values()
            .find(|i| i.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .identities
            .values()
            .find(|i| i.username == username)
            .cloned())
    }

    async fn find_by_external_link(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<Identity>, StoreError> {
        let inner = self.lock();
        let id = inner
            .links
            .get(&(provider.to_string(), provider_key.to_string()));
        Ok(id.and_then(|id| inner.identities.get(id).cloned()))
    }

    async fn create_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner
            .identities
            .values()
            .any(|i| i.email.eq_ignore_ascii_case(&identity.email))
        {
            return Err(StoreError::Duplicate("email"));
        }
        if inner
            .identities
            .values()
            .any(|i| i.username == identity.username)
        {
            return Err(StoreError::Duplicate("username"));
        }
        inner.identities.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn update_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        if self
            .fail_next_identity_update
            .swap(false, Ordering::SeqCst)
        {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "injected identity update failure"
            )));
        }
        let mut inner = self.lock();
        match inner.identities.get_mut(&identity.id) {
            Some(existing) => {
                *existing = identity.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn add_external_link(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_key: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.identities.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        inner
            .links
            .insert((provider.to_string(), provider_key.to_string()), user_id);
        Ok(())
    }

    async fn increment_failed_attempts(&self, user_id: Uuid) -> Result<i32, StoreError> {
        let mut inner = self.lock();
        let identity = inner
            .identities
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        identity.failed_attempts += 1;
        Ok(identity.failed_attempts)
    }

    async fn set_lockout(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let identity = inner
            .identities
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        identity.lockout_end = Some(until);
        Ok(())
    }

    async fn reset_failed_attempts(&self, user_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let identity = inner
            .identities
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        identity.failed_attempts = 0;
        identity.lockout_end = None;
        Ok(())
    }

    async fn get_roles(&self, user_id: Uuid) -> Result<Vec<String>, StoreError> {
        let inner = self.lock();
        let mut roles: Vec<String> = inner
            .roles
            .get(&user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        roles.sort();
        Ok(roles)
    }

    async fn add_to_role(&self, user_id: Uuid, role: &str) -> Result<(), StoreError> {
        if self.fail_next_role_add.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "injected role add failure"
            )));
        }
        let mut inner = self.lock();
        if !inner.identities.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        inner
            .roles
            .entry(user_id)
            .or_default()
            .insert(role.to_string());
        Ok(())
    }

    async fn remove_from_roles(&self, user_id: Uuid, roles: &[String]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(set) = inner.roles.get_mut(&user_id) {
            for role in roles {
                set.remove(role);
            }
        }
        Ok(())
    }

    async fn role_exists(&self, role: &str) -> Result<bool, StoreError> {
        Ok(self.lock().known_roles.contains(role))
    }

    async fn get_claims(&self, user_id: Uuid) -> Result<Vec<IdentityClaim>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .claims
            .get(&user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_claims(&self, user_id: Uuid, claims: &[IdentityClaim]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.identities.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        let set = inner.claims.entry(user_id).or_default();
        for claim in claims {
            set.insert(claim.clone());
        }
        Ok(())
    }

    async fn remove_claims(
        &self,
        user_id: Uuid,
        claims: &[IdentityClaim],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(set) = inner.claims.get_mut(&user_id) {
            for claim in claims {
                set.remove(claim);
            }
        }
        Ok(())
    }

    async fn create_company(&self, company: &Company) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.companies.values().any(|c| c.tax_id == company.tax_id) {
            return Err(StoreError::Duplicate("tax_id"));
        }
        inner.companies.insert(company.id, company.clone());
        Ok(())
    }

    async fn delete_company(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.companies.remove(&id).ok_or(StoreError::NotFound)?;
        Ok(())
    }

    async fn find_company(&self, id: Uuid) -> Result<Option<Company>, StoreError> {
        Ok(self.lock().companies.get(&id).cloned())
    }

    async fn update_company(&self, company: &Company) -> Result<(), StoreError> {
        let mut inner = self.lock();
        match inner.companies.get_mut(&company.id) {
            Some(existing) => {
                *existing = company.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn save_verification_token(&self, token: &VerificationToken) -> Result<(), StoreError> {
        self.lock().tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn take_verification_token(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let mut inner = self.lock();
        match inner.tokens.get(token) {
            Some(stored) if stored.kind == kind => Ok(inner.tokens.remove(token)),
            _ => Ok(None),
        }
    }
}
