//! Hierarchical permission engine.
//!
//! Decisions derive from role ranks, never from role-name string matches at
//! call sites. The pure predicates are separated from the mutating sync
//! operations so authorization rules stay unit-testable without a store.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{IdentityClaim, SystemRole};
use crate::store::CredentialStore;

use super::error::ServiceError;

/// May `actor` modify `target`'s profile (roles, claims)?
///
/// Self-modification through this path is always denied; privilege changes
/// require a second pair of hands. Otherwise the actor needs at least Admin
/// rank and must dominate the target.
pub fn can_modify_profile(actor: &[SystemRole], actor_id: Uuid, target: &[SystemRole], target_id: Uuid) -> bool {
    if actor_id == target_id {
        return false;
    }
    let actor_rank = SystemRole::highest_rank(actor);
    let target_rank = SystemRole::highest_rank(target);
    actor_rank >= SystemRole::Admin.rank() && target_rank <= actor_rank
}

/// May `actor` assign the given role set? Containment rule: every requested
/// role must sit at or below the actor's own highest rank. The empty set is
/// always assignable.
pub fn can_assign_roles(actor: &[SystemRole], requested: &[SystemRole]) -> bool {
    if requested.is_empty() {
        return true;
    }
    let actor_rank = SystemRole::highest_rank(actor);
    if actor_rank < SystemRole::Admin.rank() {
        return false;
    }
    requested.iter().all(|r| r.rank() <= actor_rank)
}

/// May the actor manage (enable/disable) the given company? The company's
/// own owner may; system-level roles may manage any company.
pub fn can_manage_company(
    actor: &[SystemRole],
    actor_company: Option<Uuid>,
    actor_is_owner: bool,
    company_id: Uuid,
) -> bool {
    if actor.iter().any(|r| r.is_system_level()) {
        return true;
    }
    actor_is_owner && actor_company == Some(company_id)
}

#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn CredentialStore>,
}

impl PermissionService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn roles_of(&self, user_id: Uuid) -> Result<Vec<SystemRole>, ServiceError> {
        let names = self.store.get_roles(user_id).await?;
        Ok(SystemRole::parse_known(&names))
    }

    pub async fn role_names_of(&self, user_id: Uuid) -> Result<Vec<String>, ServiceError> {
        Ok(self.store.get_roles(user_id).await?)
    }

    pub async fn claims_of(&self, user_id: Uuid) -> Result<Vec<IdentityClaim>, ServiceError> {
        Ok(self.store.get_claims(user_id).await?)
    }

    /// Viewing another profile is gated the same way as modifying it.
    pub async fn ensure_can_view(&self, actor_id: Uuid, target_id: Uuid) -> Result<(), ServiceError> {
        let actor_roles = self.roles_of(actor_id).await?;
        let target_roles = self.roles_of(target_id).await?;
        if !can_modify_profile(&actor_roles, actor_id, &target_roles, target_id) {
            return Err(ServiceError::PermissionDenied(
                "not allowed to view this profile".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the target's role set with `desired` by applying the
    /// symmetric difference. Authorization is checked before any write:
    /// the actor must be allowed to modify the target and to assign every
    /// role in the desired set.
    ///
    /// Removals run before additions. A partial failure is surfaced as an
    /// operation failure naming the step; already-applied changes stay.
    pub async fn sync_roles(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
        desired: Vec<String>,
    ) -> Result<Vec<String>, ServiceError> {
        let actor_roles = self.roles_of(actor_id).await?;
        let target_roles = self.roles_of(target_id).await?;

        let desired_known = SystemRole::parse_known(&desired);
        if !can_modify_profile(&actor_roles, actor_id, &target_roles, target_id) {
            return Err(ServiceError::PermissionDenied(
                "not allowed to modify this profile".to_string(),
            ));
        }
        if !can_assign_roles(&actor_roles, &desired_known) {
            return Err(ServiceError::PermissionDenied(
                "requested roles exceed your own".to_string(),
            ));
        }

        // Unknown role names are rejected outright rather than silently
        // dropped.
        for name in &desired {
            if !self.store.role_exists(name).await? {
                return Err(ServiceError::Invalid(format!("unknown role: {}", name)));
            }
        }

        let current: HashSet<String> = self
            .store
            .get_roles(target_id)
            .await?
            .into_iter()
            .collect();
        let wanted: HashSet<String> = desired.into_iter().collect();

        let to_remove: Vec<String> = current.difference(&wanted).cloned().collect();
        let to_add: Vec<String> = wanted.difference(&current).cloned().collect();

        if !to_remove.is_empty() {
            self.store
                .remove_from_roles(target_id, &to_remove)
                .await
                .map_err(|e| ServiceError::operation_failed("remove roles", e))?;
        }
        for role in &to_add {
            self.store
                .add_to_role(target_id, role)
                .await
                .map_err(|e| ServiceError::operation_failed("add roles", e))?;
        }

        tracing::info!(
            actor_id = %actor_id,
            target_id = %target_id,
            removed = to_remove.len(),
            added = to_add.len(),
            "Roles synchronized"
        );
        Ok(self.store.get_roles(target_id).await?)
    }

    /// Replace the target's claim set with `desired`, same diff discipline
    /// as `sync_roles`. Claims carry no hierarchy, so only the
    /// profile-modification gate applies.
    pub async fn sync_claims(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
        desired: Vec<IdentityClaim>,
    ) -> Result<Vec<IdentityClaim>, ServiceError> {
        let actor_roles = self.roles_of(actor_id).await?;
        let target_roles = self.roles_of(target_id).await?;

        if !can_modify_profile(&actor_roles, actor_id, &target_roles, target_id) {
            return Err(ServiceError::PermissionDenied(
                "not allowed to modify this profile".to_string(),
            ));
        }

        let current: HashSet<IdentityClaim> = self
            .store
            .get_claims(target_id)
            .await?
            .into_iter()
            .collect();
        let wanted: HashSet<IdentityClaim> = desired.into_iter().collect();

        let to_remove: Vec<IdentityClaim> = current.difference(&wanted).cloned().collect();
        let to_add: Vec<IdentityClaim> = wanted.difference(&current).cloned().collect();

        if !to_remove.is_empty() {
            self.store
                .remove_claims(target_id, &to_remove)
                .await
                .map_err(|e| ServiceError::operation_failed("remove claims", e))?;
        }
        if !to_add.is_empty() {
            self.store
                .add_claims(target_id, &to_add)
                .await
                .map_err(|e| ServiceError::operation_failed("add claims", e))?;
        }

        tracing::info!(
            actor_id = %actor_id,
            target_id = %target_id,
            removed = to_remove.len(),
            added = to_add.len(),
            "Claims synchronized"
        );
        Ok(self.store.get_claims(target_id).await?)
    }
}
