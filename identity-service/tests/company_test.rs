//! Company creation, single ownership, compensation.

mod common;

use common::*;
use identity_service::dtos::company::CreateCompanyRequest;
use identity_service::services::ServiceError;
use identity_service::store::CredentialStore;

fn create_request(name: &str, tax_id: &str) -> CreateCompanyRequest {
    CreateCompanyRequest {
        name: name.to_string(),
        tax_id: tax_id.to_string(),
    }
}

#[tokio::test]
async fn creating_a_company_makes_the_caller_its_owner() {
    let h = harness_with(false);
    let user = register_confirmed(&h, "erin", "erin@example.com", "hunter2hunter2").await;

    let company = h
        .companies
        .create_company(user, create_request("Acme GmbH", "DE123456789"))
        .await
        .unwrap();

    assert!(company.enabled);
    let identity = h.store.find_by_id(user).await.unwrap().unwrap();
    assert_eq!(identity.company_id, Some(company.id));
    assert!(identity.is_company_owner);
}

#[tokio::test]
async fn second_company_for_the_same_identity_is_a_conflict() {
    let h = harness_with(false);
    let user = register_confirmed(&h, "erin", "erin@example.com", "hunter2hunter2").await;

    h.companies
        .create_company(user, create_request("Acme GmbH", "DE123456789"))
        .await
        .unwrap();
    let err = h
        .companies
        .create_company(user, create_request("Acme Two", "DE987654321"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn system_level_actor_may_create_another_company() {
    let h = harness_with(false);
    let dev = register_confirmed(&h, "dev", "dev@example.com", "hunter2hunter2").await;
    grant_role(&h, dev, identity_service::models::SystemRole::Developer).await;

    let first = h
        .companies
        .create_company(dev, create_request("Acme GmbH", "DE123456789"))
        .await
        .unwrap();
    let second = h
        .companies
        .create_company(dev, create_request("Acme Two", "DE987654321"))
        .await
        .unwrap();

    // Ownership moved to the newest company.
    let identity = h.store.find_by_id(dev).await.unwrap().unwrap();
    assert_eq!(identity.company_id, Some(second.id));
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn failed_owner_write_deletes_the_company_again() {
    let h = harness_with(false);
    let user = register_confirmed(&h, "erin", "erin@example.com", "hunter2hunter2").await;

    h.store.fail_next_identity_update();
    let err = h
        .companies
        .create_company(user, create_request("Acme GmbH", "DE123456789"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::OperationFailed { .. }));

    // Compensation ran: no company survives, the identity is untouched.
    let identity = h.store.find_by_id(user).await.unwrap().unwrap();
    assert_eq!(identity.company_id, None);
    assert!(!identity.is_company_owner);

    // A retry now works, proving the tax_id was freed.
    h.companies
        .create_company(user, create_request("Acme GmbH", "DE123456789"))
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_tax_id_is_a_conflict() {
    let h = harness_with(false);
    let erin = register_confirmed(&h, "erin", "erin@example.com", "hunter2hunter2").await;
    let finn = register_confirmed(&h, "finn", "finn@example.com", "hunter2hunter2").await;

    h.companies
        .create_company(erin, create_request("Acme GmbH", "DE123456789"))
        .await
        .unwrap();
    let err = h
        .companies
        .create_company(finn, create_request("Other GmbH", "DE123456789"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn disabling_twice_is_a_conflict() {
    let h = harness_with(false);
    let user = register_confirmed(&h, "erin", "erin@example.com", "hunter2hunter2").await;
    let company = h
        .companies
        .create_company(user, create_request("Acme GmbH", "DE123456789"))
        .await
        .unwrap();

    let disabled = h.companies.set_enabled(company.id, false).await.unwrap();
    assert!(!disabled.enabled);

    let err = h.companies.set_enabled(company.id, false).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // Re-enabling works again.
    let enabled = h.companies.set_enabled(company.id, true).await.unwrap();
    assert!(enabled.enabled);
}

#[tokio::test]
async fn unknown_company_is_not_found() {
    let h = harness_with(false);
    let err = h
        .companies
        .get_company(uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
