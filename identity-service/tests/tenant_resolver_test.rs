//! Tenant resolution from token claims.

mod common;

use common::*;
use identity_service::store::CredentialStore;
use identity_service::dtos::company::CreateCompanyRequest;
use identity_service::services::{AccessClaims, LoginOutcome};
use std::collections::HashMap;

async fn login_claims(h: &Harness, username: &str, password: &str) -> AccessClaims {
    let outcome = h.accounts.login(login_request(username, password)).await.unwrap();
    match outcome {
        LoginOutcome::Succeeded(session) => h.issuer.decode(&session.token).unwrap(),
        other => panic!("expected Succeeded, got {:?}", other),
    }
}

#[tokio::test]
async fn company_claim_round_trips_without_a_store_lookup() {
    let h = harness_with(false);
    let user = register_confirmed(&h, "erin", "erin@example.com", "hunter2hunter2").await;
    let company = h
        .companies
        .create_company(
            user,
            CreateCompanyRequest {
                name: "Acme GmbH".to_string(),
                tax_id: "DE123456789".to_string(),
            },
        )
        .await
        .unwrap();

    let claims = login_claims(&h, "erin", "hunter2hunter2").await;
    assert_eq!(claims.company_id, company.id.to_string());
    assert_eq!(claims.is_company_owner, "yes");

    // Any store lookup during resolution would hit the injected failure;
    // a well-formed claim must resolve from the token alone.
    h.store.fail_next_identity_lookup();
    let resolved = h.resolver.resolve(&claims).await.unwrap();
    assert_eq!(resolved, Some(company.id));
}

#[tokio::test]
async fn the_none_marker_resolves_to_no_company() {
    let h = harness_with(false);
    register_confirmed(&h, "erin", "erin@example.com", "hunter2hunter2").await;

    let claims = login_claims(&h, "erin", "hunter2hunter2").await;
    assert_eq!(claims.company_id, "none");

    h.store.fail_next_identity_lookup();
    assert_eq!(h.resolver.resolve(&claims).await.unwrap(), None);
}

#[tokio::test]
async fn malformed_company_claim_falls_back_to_the_store() {
    let h = harness_with(false);
    let user = register_confirmed(&h, "erin", "erin@example.com", "hunter2hunter2").await;
    let company = h
        .companies
        .create_company(
            user,
            CreateCompanyRequest {
                name: "Acme GmbH".to_string(),
                tax_id: "DE123456789".to_string(),
            },
        )
        .await
        .unwrap();

    let mut claims = login_claims(&h, "erin", "hunter2hunter2").await;
    claims.company_id = "not-a-uuid".to_string();

    // The store still knows the truth.
    let resolved = h.resolver.resolve(&claims).await.unwrap();
    assert_eq!(resolved, Some(company.id));
}

#[tokio::test]
async fn malformed_claim_for_unknown_subject_is_an_error() {
    let h = harness_with(false);
    let claims = AccessClaims {
        sub: uuid::Uuid::new_v4().to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        email: "ghost@example.com".to_string(),
        name: "ghost".to_string(),
        roles: vec![],
        is_company_owner: "no".to_string(),
        company_id: "garbled".to_string(),
        exp: 0,
        iat: 0,
        extra: HashMap::new(),
    };
    assert!(h.resolver.resolve(&claims).await.is_err());
}
