//! Shared fixtures for the integration suites.
//!
//! Everything runs against the in-memory store and a recording notification
//! sender, so suites assert on real service behavior without external
//! infrastructure.

#![allow(dead_code)]

use std::sync::Arc;
use uuid::Uuid;

use identity_service::config::LockoutConfig;
use identity_service::dtos::auth::{LoginRequest, RegisterRequest};
use identity_service::models::SystemRole;
use identity_service::services::email::RecordingSender;
use identity_service::services::{
    AccountService, CompanyService, LoginOutcome, PermissionService, TenantResolver, TokenIssuer,
};
use identity_service::store::{CredentialStore, InMemoryStore};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const MAX_FAILED_ATTEMPTS: i32 = 3;
pub const BASE_URL: &str = "http://localhost:8080";

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub sender: Arc<RecordingSender>,
    pub issuer: TokenIssuer,
    pub accounts: AccountService,
    pub companies: CompanyService,
    pub permissions: PermissionService,
    pub resolver: TenantResolver,
}

pub fn harness() -> Harness {
    harness_with(true)
}

pub fn harness_with(require_confirmed_email: bool) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let sender = Arc::new(RecordingSender::new());
    let issuer = TokenIssuer::new(TEST_SECRET, 15);

    let dyn_store: Arc<dyn CredentialStore> = store.clone();
    let accounts = AccountService::new(
        dyn_store.clone(),
        issuer.clone(),
        sender.clone(),
        LockoutConfig {
            max_failed_attempts: MAX_FAILED_ATTEMPTS,
            lockout_minutes: 15,
        },
        require_confirmed_email,
        BASE_URL.to_string(),
    );

    Harness {
        companies: CompanyService::new(dyn_store.clone()),
        permissions: PermissionService::new(dyn_store.clone()),
        resolver: TenantResolver::new(dyn_store),
        store,
        sender,
        issuer,
        accounts,
    }
}

pub fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        display_name: None,
    }
}

pub fn login_request(username: &str, password: &str) -> LoginRequest {
    LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
    }
}

/// Register an identity and, when confirmation is required, confirm it
/// through the real token flow using the recorded email.
pub async fn register_confirmed(h: &Harness, username: &str, email: &str, password: &str) -> Uuid {
    let res = h
        .accounts
        .register(register_request(username, email, password))
        .await
        .expect("registration failed");

    if let Some(token) = latest_token_for(h, email) {
        h.accounts.confirm_email(&token).await.expect("confirmation failed");
    }
    res.user_id
}

/// Pull the opaque token out of the most recent email sent to `to`.
pub fn latest_token_for(h: &Harness, to: &str) -> Option<String> {
    h.sender
        .messages()
        .iter()
        .rev()
        .find(|m| m.to == to)
        .and_then(|m| {
            let text = m.text_body.as_deref()?;
            let start = text.find("token=")? + "token=".len();
            let rest = &text[start..];
            let end = rest
                .find(|c: char| !c.is_ascii_hexdigit())
                .unwrap_or(rest.len());
            Some(rest[..end].to_string())
        })
}

/// Grant a role directly at the store, bypassing the permission engine.
/// Suites use this to set up actors without needing a pre-seeded superuser.
pub async fn grant_role(h: &Harness, user_id: Uuid, role: SystemRole) {
    h.store
        .add_to_role(user_id, role.as_str())
        .await
        .expect("role grant failed");
}

pub fn assert_succeeded(outcome: &LoginOutcome) {
    assert!(
        matches!(outcome, LoginOutcome::Succeeded(_)),
        "expected Succeeded, got {:?}",
        outcome
    );
}
