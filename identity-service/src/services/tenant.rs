//! Tenant resolution and company lifecycle.
//!
//! `TenantResolver` answers "which company does this caller act for" from
//! the token claim alone on the hot path, falling back to the store only
//! when the claim is malformed. `CompanyService` owns the single-ownership
//! rule and the compensating delete when the owner write fails.

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::company::CreateCompanyRequest;
use crate::models::{Company, SystemRole};
use crate::store::CredentialStore;

use super::error::ServiceError;
use super::token::AccessClaims;

#[derive(Clone)]
pub struct TenantResolver {
    store: Arc<dyn CredentialStore>,
}

impl TenantResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Resolve the caller's company. The claim is authoritative: a literal
    /// absence marker means "no company" without any store access. Only a
    /// malformed claim triggers the store fallback.
    pub async fn resolve(&self, claims: &AccessClaims) -> Result<Option<Uuid>, ServiceError> {
        if claims.company_id == super::token::COMPANY_NONE {
            return Ok(None);
        }
        if let Some(id) = claims.company() {
            return Ok(Some(id));
        }

        tracing::warn!(
            sub = %claims.sub,
            company_claim = %claims.company_id,
            "Malformed company claim, falling back to store lookup"
        );
        let subject = claims
            .subject_id()
            .ok_or_else(|| ServiceError::Invalid("malformed subject claim".to_string()))?;
        let identity = self
            .store
            .find_by_id(subject)
            .await?
            .ok_or(ServiceError::NotFound("identity"))?;
        Ok(identity.company_id)
    }
}

#[derive(Clone)]
pub struct CompanyService {
    store: Arc<dyn CredentialStore>,
}

impl CompanyService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Create a company and make the caller its owner. An identity holds at
    /// most one company; a second creation attempt is a conflict unless the
    /// caller has a system-level role, in which case ownership moves to the
    /// new company. The two writes are not transactional, so a failed owner
    /// update compensates by deleting the freshly created company.
    pub async fn create_company(
        &self,
        owner_id: Uuid,
        req: CreateCompanyRequest,
    ) -> Result<Company, ServiceError> {
        req.validate()?;

        let mut owner = self
            .store
            .find_by_id(owner_id)
            .await?
            .ok_or(ServiceError::NotFound("identity"))?;

        if owner.company_id.is_some() {
            let roles = SystemRole::parse_known(&self.store.get_roles(owner_id).await?);
            if !roles.iter().any(|r| r.is_system_level()) {
                return Err(ServiceError::Conflict(
                    "identity already belongs to a company".to_string(),
                ));
            }
        }

        let company = Company::new(req.name, req.tax_id);
        self.store.create_company(&company).await?;

        owner.set_company(Some((company.id, true)));
        if let Err(e) = self.store.update_identity(&owner).await {
            tracing::error!(
                company_id = %company.id,
                owner_id = %owner_id,
                error = %e,
                "Owner update failed, compensating by deleting company"
            );
            if let Err(del) = self.store.delete_company(company.id).await {
                // Both writes failed; the orphan company is logged for
                // manual cleanup.
                tracing::error!(company_id = %company.id, error = %del, "Compensation delete failed");
            }
            return Err(ServiceError::operation_failed("assign company owner", e));
        }

        tracing::info!(company_id = %company.id, owner_id = %owner_id, "Company created");
        Ok(company)
    }

    pub async fn get_company(&self, id: Uuid) -> Result<Company, ServiceError> {
        self.store
            .find_company(id)
            .await?
            .ok_or(ServiceError::NotFound("company"))
    }

    /// Flip the enabled flag. Transitioning to the state the company is
    /// already in is a conflict, so repeated toggles are visible to callers.
    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<Company, ServiceError> {
        let mut company = self.get_company(id).await?;
        if company.enabled == enabled {
            return Err(ServiceError::Conflict(format!(
                "company is already {}",
                if enabled { "enabled" } else { "disabled" }
            )));
        }
        company.enabled = enabled;
        self.store.update_company(&company).await?;
        tracing::info!(company_id = %id, enabled, "Company state changed");
        Ok(company)
    }
}
