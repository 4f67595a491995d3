//! External-provider login: linking, creation, idempotence.

mod common;

use common::*;
use identity_service::store::CredentialStore;
use identity_service::services::external::ExternalAssertion;
use identity_service::services::LoginOutcome;

fn assertion(key: &str, email: Option<&str>) -> ExternalAssertion {
    ExternalAssertion {
        provider: "google".to_string(),
        subject_key: key.to_string(),
        email: email.map(|e| e.to_string()),
        display_name: Some("Dana D.".to_string()),
    }
}

#[tokio::test]
async fn first_external_login_creates_a_confirmed_identity() {
    let h = harness();

    let outcome = h
        .accounts
        .external_login(assertion("g-123", Some("dana@example.com")))
        .await
        .unwrap();

    let session = match outcome {
        LoginOutcome::Succeeded(session) => session,
        other => panic!("expected Succeeded, got {:?}", other),
    };

    let identity = h.store.find_by_id(session.user_id).await.unwrap().unwrap();
    assert!(identity.email_confirmed);
    assert!(identity.password_hash.is_none());
    assert_eq!(identity.username, "dana@example.com");
    assert_eq!(identity.display_name.as_deref(), Some("Dana D."));
    assert!(session.roles.contains(&"User".to_string()));
}

#[tokio::test]
async fn repeating_the_callback_is_idempotent() {
    let h = harness();

    let first = h
        .accounts
        .external_login(assertion("g-123", Some("dana@example.com")))
        .await
        .unwrap();
    let second = h
        .accounts
        .external_login(assertion("g-123", Some("dana@example.com")))
        .await
        .unwrap();

    match (first, second) {
        (LoginOutcome::Succeeded(a), LoginOutcome::Succeeded(b)) => {
            assert_eq!(a.user_id, b.user_id);
        }
        (a, b) => panic!("expected two successes, got {:?} / {:?}", a, b),
    }

    // Exactly one identity exists for that email.
    let identity = h.store.find_by_email("dana@example.com").await.unwrap();
    assert!(identity.is_some());
}

#[tokio::test]
async fn matching_email_links_to_the_existing_identity() {
    let h = harness_with(false);
    let user_id = register_confirmed(&h, "dana", "dana@example.com", "hunter2hunter2").await;

    let outcome = h
        .accounts
        .external_login(assertion("g-456", Some("dana@example.com")))
        .await
        .unwrap();

    match outcome {
        LoginOutcome::Succeeded(session) => assert_eq!(session.user_id, user_id),
        other => panic!("expected Succeeded, got {:?}", other),
    }

    // The link is durable: next time the lookup is by provider key alone.
    let linked = h
        .store
        .find_by_external_link("google", "g-456")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(linked.id, user_id);
}

#[tokio::test]
async fn assertion_without_email_fails_for_unlinked_subjects() {
    let h = harness();
    let outcome = h
        .accounts
        .external_login(assertion("g-789", None))
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::Failed(_)));
}

#[tokio::test]
async fn linking_by_email_confirms_a_pending_local_account() {
    let h = harness();
    let user_id = h
        .accounts
        .register(register_request("dana", "dana@example.com", "hunter2hunter2"))
        .await
        .unwrap()
        .user_id;

    // The account never confirmed locally; the provider vouches for the
    // address, so the callback issues a token instead of NotAllowed.
    let outcome = h
        .accounts
        .external_login(assertion("g-456", Some("dana@example.com")))
        .await
        .unwrap();
    match outcome {
        LoginOutcome::Succeeded(session) => assert_eq!(session.user_id, user_id),
        other => panic!("expected Succeeded, got {:?}", other),
    }

    let identity = h.store.find_by_id(user_id).await.unwrap().unwrap();
    assert!(identity.email_confirmed);
}

#[tokio::test]
async fn linked_identity_still_goes_through_pre_signin_checks() {
    let h = harness();
    h.accounts
        .external_login(assertion("g-123", Some("dana@example.com")))
        .await
        .unwrap();

    let identity = h.store.find_by_email("dana@example.com").await.unwrap().unwrap();
    h.store
        .set_lockout(identity.id, chrono::Utc::now() + chrono::Duration::minutes(15))
        .await
        .unwrap();

    let outcome = h
        .accounts
        .external_login(assertion("g-123", Some("dana@example.com")))
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::LockedOut));
}
